use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    export::{export_bulk, export_file},
    files::{
        create_file, delete_file, get_file, get_file_pdf, list_files, multi_upload,
        recompile_file, update_file, upload_file,
    },
    liveness::live,
    readiness::ready,
    search::search_files,
    semesters::{create_semester, delete_semester, get_semester, list_semesters, update_semester},
    stats::get_stats,
    subjects::{create_subject, delete_subject, get_subject, list_subjects, update_subject},
    years::{create_year, delete_year, get_year, list_years, update_year},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes (for k8s/systemd)
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let hierarchy = Router::new()
        .route("/years", get(list_years).post(create_year))
        .route(
            "/years/{id}",
            get(get_year).put(update_year).delete(delete_year),
        )
        .route("/semesters", get(list_semesters).post(create_semester))
        .route(
            "/semesters/{id}",
            get(get_semester)
                .put(update_semester)
                .delete(delete_semester),
        )
        .route("/subjects", get(list_subjects).post(create_subject))
        .route(
            "/subjects/{id}",
            get(get_subject).put(update_subject).delete(delete_subject),
        );

    let files = Router::new()
        .route("/files", get(list_files).post(create_file))
        .route(
            "/files/upload",
            post(upload_file).layer(DefaultBodyLimit::max(
                app_state.config.upload_max_body_bytes,
            )),
        )
        .route("/files/multi-upload", post(multi_upload))
        .route(
            "/files/{id}",
            get(get_file).put(update_file).delete(delete_file),
        )
        .route("/files/{id}/recompile", post(recompile_file))
        .route("/files/{id}/pdf", get(get_file_pdf));

    let queries = Router::new()
        .route("/search", post(search_files))
        .route("/export/bulk", post(export_bulk))
        .route("/export/{id}", get(export_file))
        .route("/stats", get(get_stats));

    probes.merge(hierarchy).merge(files).merge(queries)
}
