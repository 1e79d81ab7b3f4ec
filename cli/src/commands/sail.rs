//! `armada sail <plan_dir> [--ships=N]` — launch a new voyage.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet::{sail, NullReporter, Reporter};
use crate::output::progress::SpinnerReporter;
use crate::plan;

#[derive(Args)]
pub struct SailArgs {
    /// Plan directory holding spec.md, verify.sh, voyage.json, and tasks/
    pub plan_dir: PathBuf,

    /// Override the plan's recommended ship count
    #[arg(long)]
    pub ships: Option<u32>,
}

/// Run `armada sail`.
///
/// # Errors
///
/// Returns an error when the plan is invalid or when storage provisioning
/// or repository seeding fails. Ship failures are warnings, not errors: the
/// command exits partial and the operator resumes the gaps.
pub async fn run(args: &SailArgs, app: &AppContext) -> Result<Outcome> {
    let plan = plan::load(&args.plan_dir)?;
    let ships = args.ships.unwrap_or(if plan.config.recommended_ships > 0 {
        plan.config.recommended_ships
    } else {
        app.config.default_ships
    });

    let spinners = SpinnerReporter::default();
    let reporter: &dyn Reporter = if app.is_json() {
        &NullReporter
    } else if app.console.wants_spinners() {
        &spinners
    } else {
        &app.console
    };
    let report = sail::sail(&app.provider, &app.remote, &plan, ships, reporter).await?;

    if app.is_json() {
        let failures: Vec<serde_json::Value> = report
            .failures
            .iter()
            .map(|f| serde_json::json!({"index": f.index, "error": f.error}))
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "voyage": report.voyage,
                "ships_launched": report.launched,
                "ship_failures": failures,
            })
        );
    } else {
        app.console.section(&format!("voyage {}", report.voyage.id));
        app.console.field("objective", &report.voyage.objective);
        app.console.field("repo", &report.voyage.repo);
        app.console.field("branch", &report.voyage.branch);
        app.console.field(
            "ships",
            format!("{}/{} launched", report.launched.len(), ships),
        );
        app.console.field("tasks", plan.tasks.len());
        app.console.blank();
        if report.failures.is_empty() {
            app.console
                .note(&format!("Run: armada status {}", report.voyage.id));
        } else {
            app.console.warn(&format!(
                "{} ship(s) failed to launch. Run: armada resume {} --ships={}",
                report.failures.len(),
                report.voyage.id,
                report.failures.len(),
            ));
        }
    }

    Ok(if report.failures.is_empty() {
        Outcome::Clean
    } else {
        Outcome::Partial
    })
}
