use chatrelay_core::{model_label, AppConfig, LoadOptions, MODEL_CATALOG};
use chatrelay_store::{connect_with_settings, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_default_model(&config));
            checks.push(check_store_schema(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "default_model_catalog",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "store_schema",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// The process-default model backs every workspace that has not configured
/// its own, and the configure modal can only select catalog entries. A
/// default outside the catalog would silently disappear on the next edit.
fn check_default_model(config: &AppConfig) -> DoctorCheck {
    let model = config.provider.default_model.as_str();

    match model_label(model) {
        Some(label) => DoctorCheck {
            name: "default_model_catalog",
            status: CheckStatus::Pass,
            details: format!("default model `{model}` ({label}) is selectable in the configure form"),
        },
        None => {
            let known: Vec<&str> = MODEL_CATALOG.iter().map(|(id, _)| *id).collect();
            DoctorCheck {
                name: "default_model_catalog",
                status: CheckStatus::Fail,
                details: format!(
                    "default model `{model}` is not in the model catalog ({}); \
                     workspaces cannot re-select it from the configure form",
                    known.join(", ")
                ),
            }
        }
    }
}

fn check_store_schema(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "store_schema",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.store.url,
            config.store.max_connections,
            config.store.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to config store: {error}"))?;

        let applied = migrations::applied_count(&pool).await;
        pool.close().await;
        applied.map_err(|_| "store schema not initialized; run `chatrelay migrate`".to_string())
    });

    match result {
        Ok(applied) => DoctorCheck {
            name: "store_schema",
            status: CheckStatus::Pass,
            details: format!(
                "connected using `{}`; {applied} migration(s) applied",
                config.store.url
            ),
        },
        Err(error) => DoctorCheck { name: "store_schema", status: CheckStatus::Fail, details: error },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
