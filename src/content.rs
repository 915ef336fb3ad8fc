use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;
use url::Url;

use crate::case_study::CaseStudy;
use crate::cli::CheckArgs;
use crate::formats::{Certification, Experience, Project, ProjectMedia, Skill};

/// Ordering slot for projects without an explicit `featured_order`.
const UNORDERED: i64 = 999;

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn projects(&self) -> anyhow::Result<Vec<Project>>;
    async fn experiences(&self) -> anyhow::Result<Vec<Experience>>;
    async fn certifications(&self) -> anyhow::Result<Vec<Certification>>;
    async fn skills(&self) -> anyhow::Result<Vec<Skill>>;
}

/// JSON files in a data directory. A missing file reads as an empty list.
#[derive(Debug, Clone)]
pub struct LocalFsContentStore {
    base_dir: PathBuf,
}

impl LocalFsContentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    async fn read_list<T: serde::de::DeserializeOwned>(
        &self,
        file_name: &str,
    ) -> anyhow::Result<Vec<T>> {
        let path = self.base_dir.join(file_name);
        let records = read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))?;
        Ok(records.unwrap_or_default())
    }
}

#[async_trait]
impl ContentStore for LocalFsContentStore {
    async fn projects(&self) -> anyhow::Result<Vec<Project>> {
        self.read_list("projects.json").await
    }

    async fn experiences(&self) -> anyhow::Result<Vec<Experience>> {
        self.read_list("experiences.json").await
    }

    async fn certifications(&self) -> anyhow::Result<Vec<Certification>> {
        self.read_list("certifications.json").await
    }

    async fn skills(&self) -> anyhow::Result<Vec<Skill>> {
        self.read_list("skills.json").await
    }
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

/// Read-side queries the public pages are built from.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn ContentStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Published projects, featured first, then by `featured_order`.
    pub async fn published_projects(&self) -> anyhow::Result<Vec<Project>> {
        let mut projects = self
            .store
            .projects()
            .await?
            .into_iter()
            .filter(Project::is_published)
            .collect::<Vec<_>>();
        projects.sort_by(|a, b| {
            b.featured
                .cmp(&a.featured)
                .then_with(|| featured_order(a).cmp(&featured_order(b)))
        });
        Ok(projects)
    }

    pub async fn featured_projects(&self) -> anyhow::Result<Vec<Project>> {
        let mut projects = self
            .store
            .projects()
            .await?
            .into_iter()
            .filter(|p| p.is_published() && p.featured)
            .collect::<Vec<_>>();
        projects.sort_by_key(featured_order);
        Ok(projects)
    }

    /// Drafts are invisible here, exactly like unknown slugs.
    pub async fn project_by_slug(&self, slug: &str) -> anyhow::Result<Option<Project>> {
        Ok(self
            .store
            .projects()
            .await?
            .into_iter()
            .find(|p| p.slug == slug && p.is_published()))
    }

    pub async fn project_media(&self, project_id: &str) -> anyhow::Result<Vec<ProjectMedia>> {
        let project = self
            .store
            .projects()
            .await?
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| anyhow::anyhow!("project not found: {project_id}"))?;
        let mut media = project.media;
        media.sort_by_key(|m| m.sort_order);
        Ok(media)
    }

    pub async fn case_study(&self, slug: &str) -> anyhow::Result<Option<CaseStudy>> {
        let project = self.project_by_slug(slug).await?;
        Ok(project.map(|p| CaseStudy::parse(p.case_study_md.as_deref())))
    }

    pub async fn experiences(&self) -> anyhow::Result<Vec<Experience>> {
        let mut experiences = self.store.experiences().await?;
        experiences.sort_by_key(|e| e.sort_order);
        Ok(experiences)
    }

    pub async fn certifications(&self) -> anyhow::Result<Vec<Certification>> {
        let mut certifications = self.store.certifications().await?;
        certifications.sort_by_key(|c| c.sort_order);
        Ok(certifications)
    }

    pub async fn skills(&self) -> anyhow::Result<Vec<Skill>> {
        let mut skills = self.store.skills().await?;
        skills.sort_by_key(|s| s.sort_order);
        Ok(skills)
    }

    pub async fn skills_by_category(&self, category: &str) -> anyhow::Result<Vec<Skill>> {
        let mut skills = self.skills().await?;
        skills.retain(|s| s.category == category);
        Ok(skills)
    }
}

fn featured_order(project: &Project) -> i64 {
    project.featured_order.unwrap_or(UNORDERED)
}

pub async fn check(args: CheckArgs) -> anyhow::Result<()> {
    let store = LocalFsContentStore::new(&args.data_dir);
    let projects = store.projects().await.context("load projects")?;
    let experiences = store.experiences().await.context("load experiences")?;
    let certifications = store.certifications().await.context("load certifications")?;
    let skills = store.skills().await.context("load skills")?;

    let problems = find_problems(&projects, &certifications);
    for problem in &problems {
        tracing::warn!(%problem, "content problem");
    }

    let case_studies = projects
        .iter()
        .filter(|p| !CaseStudy::parse(p.case_study_md.as_deref()).is_empty())
        .count();
    tracing::info!(
        projects = projects.len(),
        case_studies,
        experiences = experiences.len(),
        certifications = certifications.len(),
        skills = skills.len(),
        "content loaded"
    );

    if !problems.is_empty() {
        anyhow::bail!("{} content problem(s) in {}", problems.len(), args.data_dir);
    }
    println!(
        "ok: {} projects ({} with case studies), {} experiences, {} certifications, {} skills",
        projects.len(),
        case_studies,
        experiences.len(),
        certifications.len(),
        skills.len()
    );
    Ok(())
}

fn find_problems(projects: &[Project], certifications: &[Certification]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut slugs = HashSet::new();

    for project in projects {
        if project.slug.trim().is_empty() {
            problems.push(format!("project {} has an empty slug", project.id));
        } else if !slugs.insert(project.slug.as_str()) {
            problems.push(format!("duplicate project slug: {}", project.slug));
        }

        let links = [
            ("repo_url", project.repo_url.as_deref()),
            ("live_url", project.live_url.as_deref()),
            ("demo_video_url", project.demo_video_url.as_deref()),
            ("cover_image_url", project.cover_image_url.as_deref()),
        ];
        for (field, link) in links {
            if let Some(link) = link
                && let Err(err) = check_link(link)
            {
                problems.push(format!("project {} {field}: {err}", project.slug));
            }
        }
        for media in &project.media {
            if let Err(err) = check_link(&media.url) {
                problems.push(format!("project {} media {}: {err}", project.slug, media.id));
            }
        }
    }

    for certification in certifications {
        if let Some(link) = certification.credential_url.as_deref()
            && let Err(err) = check_link(link)
        {
            problems.push(format!(
                "certification {} credential_url: {err}",
                certification.id
            ));
        }
    }

    problems
}

/// Absolute http(s) URLs, or site-relative paths such as `/media/cover.png`.
fn check_link(link: &str) -> Result<(), String> {
    if link.starts_with('/') && !link.starts_with("//") {
        return Ok(());
    }
    let url = Url::parse(link).map_err(|err| format!("invalid url {link:?}: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported url scheme {other:?} in {link:?}")),
    }
}
