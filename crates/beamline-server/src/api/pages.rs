use crate::error::Result;
use crate::state::AppState;
use axum::{extract::State, response::Html};

/// Render the landing page. The template is read on every request so it can
/// be edited without a restart.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let template = tokio::fs::read_to_string(&state.config.index_template).await?;
    Ok(Html(render(&template, &state.config.stun_servers)))
}

fn render(template: &str, stun_servers: &[String]) -> String {
    let stun = serde_json::to_string(stun_servers).unwrap_or_else(|_| "[]".to_string());
    template
        .replace("{{stun_servers}}", &stun)
        .replace("{{signaling_path}}", "/ws")
}
