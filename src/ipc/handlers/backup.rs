use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn get_path(params: &serde_json::Value, key: &str) -> Option<PathBuf> {
    params.get(key).and_then(|v| v.as_str()).map(PathBuf::from)
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(out_path) = get_path(&req.params, "outPath") else {
        return err(&req.id, "bad_params", "missing params.outPath", None);
    };

    match backup::export_store_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "dbSha256": summary.db_sha256,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "backup_export_failed", format!("{e:?}"), None),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(in_path) = get_path(&req.params, "inPath") else {
        return err(&req.id, "bad_params", "missing params.inPath", None);
    };

    // The open connection would race the file swap. Drop it, and drop any
    // session whose edit buffer came from the store being replaced.
    state.db = None;
    state.session = None;

    let summary = match backup::import_store_bundle(&in_path, &workspace) {
        Ok(summary) => summary,
        Err(e) => {
            // Leave the workspace usable even after a failed import.
            match db::open_db(&workspace) {
                Ok(conn) => state.db = Some(conn),
                Err(reopen) => {
                    tracing::warn!(error = %reopen, "store reopen after failed import");
                }
            }
            return err(&req.id, "backup_import_failed", format!("{e:?}"), None);
        }
    };

    match db::open_db(&workspace) {
        Ok(conn) => {
            state.db = Some(conn);
            ok(
                &req.id,
                json!({ "bundleFormatDetected": summary.bundle_format_detected }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportStoreBundle" => Some(handle_backup_export(state, req)),
        "backup.importStoreBundle" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
