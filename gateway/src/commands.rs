//! Terminal front end: the question -> selection -> results flow plus
//! history and data management.

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use agent::app::report_filename;
use agent::{BatchOutcome, CompletionProvider, InsightApp};
use common::{AppConfig, Difficulty, LocalStorage, ModelCatalog, ModelCategory};

/// Everything a command needs besides its own arguments.
pub struct Services {
    pub config: AppConfig,
    pub catalog: Arc<ModelCatalog>,
    pub provider: Arc<dyn CompletionProvider>,
    pub storage: Arc<LocalStorage>,
}

impl Services {
    fn app(&self) -> InsightApp {
        InsightApp::new(
            &self.config,
            self.catalog.clone(),
            self.provider.clone(),
            self.storage.clone(),
        )
    }
}

/// Ask a question, pick models (the first suggestions when none are
/// given) and print the analyses.
pub async fn ask(
    ctx: &Services,
    out: &mut impl Write,
    question: &str,
    picks: &[String],
    report_dir: Option<&Path>,
) -> Result<()> {
    let mut app = ctx.app();
    let state = app.submit(question).await?;

    writeln!(out, "Suggested thinking models:")?;
    for (i, model) in state.suggested.iter().enumerate() {
        writeln!(out, "  {}. {} [{}] {}", i + 1, model.display_name(), model.id, model.description)?;
    }

    let picks: Vec<String> = if picks.is_empty() {
        state.suggested.iter().take(state.max_selection).map(|m| m.id.clone()).collect()
    } else {
        picks.to_vec()
    };
    for id in &picks {
        app.toggle(id)?;
    }

    writeln!(out, "\nAnalyzing with {} model(s)...\n", picks.len())?;
    let outcome = app.start_analysis().await?;
    print_outcome(out, &ctx.catalog, &outcome)?;
    writeln!(out, "Remaining analyses: {}", app.remaining_uses())?;

    if let (Some(dir), Some(report)) = (report_dir, app.report()) {
        write_report(out, dir, &report)?;
    }
    Ok(())
}

/// Show the last session if it is still fresh.
pub fn resume(ctx: &Services, out: &mut impl Write, report_dir: Option<&Path>) -> Result<()> {
    let mut app = ctx.app();
    if !app.restore() {
        writeln!(out, "No session to resume.")?;
        return Ok(());
    }
    let state = app.state();
    writeln!(out, "Question: {}", state.question)?;
    writeln!(out, "Step: {:?}", state.step)?;
    if !state.selected.is_empty() {
        writeln!(out, "Selected: {}", state.selected.join(", "))?;
    }
    for (id, result) in &state.results {
        writeln!(out, "\n## {}\n{}", ctx.catalog.display_name(id), result.content)?;
    }
    if let (Some(dir), Some(report)) = (report_dir, app.report()) {
        write_report(out, dir, &report)?;
    }
    Ok(())
}

fn print_outcome(out: &mut impl Write, catalog: &ModelCatalog, outcome: &BatchOutcome) -> Result<()> {
    for id in &outcome.requested {
        if let Some(result) = outcome.results.get(id) {
            writeln!(out, "## {}\n{}\n", catalog.display_name(id), result.content)?;
        } else if let Some(err) = outcome.errors.get(id) {
            let retry = match (err.can_retry, err.retry_delay_ms) {
                (true, Some(ms)) => format!(" (retry in {}s)", ms / 1000),
                (true, None) => " (retryable)".to_string(),
                (false, _) => String::new(),
            };
            writeln!(out, "## {}\nFailed [{}]: {}{}\n", catalog.display_name(id), err.error_type, err.message, retry)?;
        }
    }
    Ok(())
}

fn write_report(out: &mut impl Write, dir: &Path, report: &str) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(report_filename(Utc::now()));
    std::fs::write(&path, report).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    writeln!(out, "Report saved to {}", path.display())?;
    Ok(())
}

pub fn models(
    catalog: &ModelCatalog,
    out: &mut impl Write,
    category: Option<&str>,
    difficulty: Option<&str>,
    search: Option<&str>,
) -> Result<()> {
    let mut models: Vec<_> = match category {
        Some(name) => {
            let Some(category) = ModelCategory::parse(name) else {
                let known: Vec<&str> = ModelCategory::ALL.iter().map(|c| c.as_str()).collect();
                bail!("Unknown category '{}'. Known: {}", name, known.join(", "));
            };
            catalog.filter_by_category(category)
        }
        None => catalog.iter().collect(),
    };
    if let Some(name) = difficulty {
        let Some(difficulty) = Difficulty::parse(name) else {
            bail!("Unknown difficulty '{}'. Use easy, medium or hard", name);
        };
        let allowed = catalog.filter_by_difficulty(difficulty);
        models.retain(|m| allowed.iter().any(|a| a.id == m.id));
    }
    if let Some(query) = search {
        models.retain(|m| m.matches(query));
    }

    for model in &models {
        writeln!(
            out,
            "{:<28} {:<18} {:?}  {}",
            model.id,
            model.category.label(),
            model.difficulty,
            model.display_name()
        )?;
    }
    writeln!(out, "{} of {} models", models.len(), catalog.len())?;
    Ok(())
}

pub fn history(storage: &LocalStorage, out: &mut impl Write, favorites_only: bool, show: Option<&str>) -> Result<()> {
    if let Some(id) = show {
        let Some(item) = storage.find_history(id) else {
            bail!("No history entry with id {}", id);
        };
        writeln!(out, "Question: {}", item.question)?;
        for model_id in &item.selected_models {
            if let Some(result) = item.results.get(model_id) {
                writeln!(out, "\n## {}\n{}", model_id, result.content)?;
            }
        }
        return Ok(());
    }

    let items: Vec<_> = storage
        .history()
        .into_iter()
        .filter(|item| !favorites_only || item.is_favorite)
        .collect();
    if items.is_empty() {
        writeln!(out, "No saved analyses.")?;
        return Ok(());
    }
    for item in items {
        writeln!(
            out,
            "{} {} {}  {} [{}]",
            if item.is_favorite { "*" } else { " " },
            item.id,
            item.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            item.question,
            item.selected_models.join(", ")
        )?;
    }
    Ok(())
}

pub fn favorite(storage: &LocalStorage, out: &mut impl Write, id: &str) -> Result<()> {
    match storage.toggle_favorite(id) {
        Some(true) => writeln!(out, "Marked {} as favorite", id)?,
        Some(false) => writeln!(out, "Removed {} from favorites", id)?,
        None => bail!("No history entry with id {}", id),
    }
    Ok(())
}

pub fn remove(storage: &LocalStorage, out: &mut impl Write, id: &str) -> Result<()> {
    if !storage.remove_history(id) {
        bail!("No history entry with id {}", id);
    }
    writeln!(out, "Removed {}", id)?;
    Ok(())
}

pub fn export(storage: &LocalStorage, out: &mut impl Write, path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(&storage.export_all())?;
    match path {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            writeln!(out, "Exported to {}", path.display())?;
        }
        None => writeln!(out, "{}", json)?,
    }
    Ok(())
}

pub fn import(storage: &LocalStorage, out: &mut impl Write, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    storage
        .import_json(&json)
        .with_context(|| format!("{} is not a valid export", path.display()))?;
    writeln!(out, "Imported {}", path.display())?;
    Ok(())
}

pub fn clear(storage: &LocalStorage, out: &mut impl Write) -> Result<()> {
    storage.clear_all();
    writeln!(out, "All saved data cleared")?;
    Ok(())
}

pub fn usage(storage: &LocalStorage, out: &mut impl Write, limit: u32) -> Result<()> {
    let record = storage.usage();
    writeln!(out, "Analyses used: {} of {}", record.count, limit)?;
    if let Some(last) = record.last_used {
        writeln!(out, "Last used: {}", last.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::llm::SyntheticProvider;
    use tempfile::tempdir;

    fn services(storage: Arc<LocalStorage>) -> Services {
        Services {
            config: AppConfig::default(),
            catalog: Arc::new(ModelCatalog::builtin().unwrap()),
            provider: Arc::new(SyntheticProvider::new()),
            storage,
        }
    }

    fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_ask_saves_history_and_report() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::in_memory());
        let ctx = services(storage.clone());
        let mut out = Vec::new();

        ask(&ctx, &mut out, "Should I start a company?", &[], Some(dir.path()))
            .await
            .unwrap();

        let output = text(out);
        assert!(output.contains("Suggested thinking models:"));
        assert!(output.contains("Remaining analyses: 2"));
        assert_eq!(storage.history().len(), 1);
        assert_eq!(storage.history()[0].results.len(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_ask_is_blocked_after_trial_limit() {
        let storage = Arc::new(LocalStorage::in_memory());
        let ctx = services(storage.clone());
        for _ in 0..3 {
            ask(&ctx, &mut Vec::new(), "How do I focus better?", &[], None)
                .await
                .unwrap();
        }
        let err = ask(&ctx, &mut Vec::new(), "How do I focus better?", &[], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("trial limit"));
        assert_eq!(storage.usage().count, 3);
    }

    #[tokio::test]
    async fn test_ask_rejects_unsuggested_pick() {
        let ctx = services(Arc::new(LocalStorage::in_memory()));
        let picks = vec!["no-such-model".to_string()];
        assert!(ask(&ctx, &mut Vec::new(), "How do I focus better?", &picks, None)
            .await
            .is_err());
    }

    #[test]
    fn test_models_filters() {
        let catalog = ModelCatalog::builtin().unwrap();
        let mut out = Vec::new();
        models(&catalog, &mut out, Some("risk-management"), None, None).unwrap();
        let listed = text(out);
        let expected = catalog.filter_by_category(ModelCategory::RiskManagement).len();
        assert!(listed.contains(&format!("{} of {} models", expected, catalog.len())));

        assert!(models(&catalog, &mut Vec::new(), Some("nonsense"), None, None).is_err());
    }

    #[tokio::test]
    async fn test_history_favorite_export_import() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::in_memory());
        let ctx = services(storage.clone());
        ask(&ctx, &mut Vec::new(), "Is remote work worth it?", &[], None)
            .await
            .unwrap();
        let id = storage.history()[0].id.clone();

        favorite(&storage, &mut Vec::new(), &id).unwrap();
        let mut out = Vec::new();
        history(&storage, &mut out, true, None).unwrap();
        assert!(text(out).contains(&id));

        let file = dir.path().join("backup.json");
        export(&storage, &mut Vec::new(), Some(file.clone())).unwrap();
        clear(&storage, &mut Vec::new()).unwrap();
        assert!(storage.history().is_empty());

        import(&storage, &mut Vec::new(), &file).unwrap();
        assert_eq!(storage.history()[0].id, id);
        assert!(storage.history()[0].is_favorite);

        remove(&storage, &mut Vec::new(), &id).unwrap();
        assert!(remove(&storage, &mut Vec::new(), &id).is_err());
    }
}
