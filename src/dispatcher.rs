//! Inbound frame handling.
//!
//! Each frame is parsed into a [`Request`] and applied to the shared state.
//! Failures are handled here: they are logged, and only the project
//! operations and speech generation reply with an error frame.

use crate::clients::ClientId;
use crate::error::AppError;
use crate::history;
use crate::model::cue::default_file_name;
use crate::model::{ChannelId, Command, ProjectDocument};
use crate::project::ProjectStore;
use crate::protocol::{Frame, Request};
use crate::state::AppState;
use crate::timeline;
use crate::tts::SpeechRequest;

/// Handle one text frame from `client`.
pub async fn handle_frame(state: &AppState, client: ClientId, raw: &str) {
    log::debug!("Message received from {client}: {raw}");

    let request = match Request::parse(raw) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Dropping frame from {client}: {e}");
            return;
        }
    };

    let keyword = request.keyword();
    if let Err(e) = dispatch(state, client, request).await {
        log::warn!("{keyword} from {client} failed: {e}");
    }
}

/// Apply a parsed request.
pub async fn dispatch(state: &AppState, client: ClientId, request: Request) -> Result<(), AppError> {
    match request {
        Request::Start { at } => timeline::start(state, at),
        Request::Stop => timeline::stop(state),
        Request::Seek { tick } => timeline::seek(state, tick),
        Request::SetSendToAll { enabled } => timeline::set_broadcast_override(state, enabled),
        Request::Test => {
            log::info!("Sending test cue");
            state.broadcast(&Frame::test_play());
        }
        Request::Generate {
            text,
            file_name,
            channel,
            time,
        } => generate(state, client, text, file_name, channel, &time).await?,
        Request::GenerateCommand { text, name } => {
            generate_command(state, client, text, name).await?;
        }
        Request::UpdateJson { payload } => update_json(state, &payload)?,
        Request::NewProject { name } => new_project(state, client, &name),
        Request::ListProjects => list_projects(state, client),
        Request::LoadProject { name } => load_project(state, client, &name),
        Request::SaveAs { name } => save_as(state, client, &name),
        Request::GetCurrentProject => {
            let name = state.with_project(ProjectStore::current_project_name);
            state.send_to(client, &Frame::CurrentProject(name));
        }
        Request::Echo { raw } => state.clients.broadcast(&raw),
    }
    Ok(())
}

// ── Speech generation ───────────────────────────────────────────────

/// Run the generator without holding any lock. On failure the requester is
/// told and the error is returned for logging.
async fn synthesize(
    state: &AppState,
    client: ClientId,
    request: SpeechRequest,
) -> Result<(), AppError> {
    if let Err(e) = state.synth.synthesize(&request).await {
        state.send_to(client, &Frame::GenerateError(e.to_string()));
        return Err(e);
    }
    Ok(())
}

async fn generate(
    state: &AppState,
    client: ClientId,
    text: String,
    file_name: String,
    channel: ChannelId,
    time: &str,
) -> Result<(), AppError> {
    let entry = history::format_entry(time, &channel, &default_file_name(&file_name), &text);
    synthesize(
        state,
        client,
        SpeechRequest {
            text,
            namespace: channel.to_string(),
            base_name: file_name,
        },
    )
    .await?;

    if state.with_history_mut(|log| log.append(entry))? {
        log::info!("Recorded generated cue in history");
    }
    Ok(())
}

/// Render a command into the active project's namespace. The command is
/// stored in the project that was active when the request arrived, even if
/// another project was loaded while the generator ran.
async fn generate_command(
    state: &AppState,
    client: ClientId,
    text: String,
    name: String,
) -> Result<(), AppError> {
    let (namespace, target) = state.with_project(|project| {
        (
            project.current_project_name(),
            project.active_path().to_path_buf(),
        )
    });
    synthesize(
        state,
        client,
        SpeechRequest {
            text: text.clone(),
            namespace,
            base_name: name.clone(),
        },
    )
    .await?;

    let still_active = state.with_project_mut(|project| {
        project.store_command(&target, Command::rendered(name.clone(), text))
    })?;
    log::info!("Stored command '{name}' in {}", target.display());
    if still_active {
        state.broadcast(&Frame::DataUpdated);
    }
    Ok(())
}

// ── Project operations ──────────────────────────────────────────────

fn update_json(state: &AppState, payload: &str) -> Result<(), AppError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| AppError::validation(format!("updateJSON: {e}")))?;
    let doc = ProjectDocument::from_value(value).map_err(AppError::validation)?;

    state.with_project_mut(|project| {
        project.replace_document(doc);
        project.save()
    })?;
    log::info!("Project replaced by client update");
    state.broadcast(&Frame::DataUpdated);
    Ok(())
}

fn project_error(state: &AppState, client: ClientId, err: AppError) {
    log::warn!("Project operation from {client} failed: {err}");
    state.send_to(client, &Frame::ProjectError(err.client_reason()));
}

/// The active project changed: tell everyone which one and to refetch it.
fn announce_active_project(state: &AppState, name: String) {
    state.broadcast(&Frame::CurrentProject(name));
    state.broadcast(&Frame::DataUpdated);
}

fn new_project(state: &AppState, client: ClientId, name: &str) {
    match state.with_project_mut(|project| project.new_project(name)) {
        Ok(created) => {
            state.send_to(client, &Frame::ProjectCreated(created.clone()));
            announce_active_project(state, created);
        }
        Err(e) => project_error(state, client, e.into()),
    }
}

fn list_projects(state: &AppState, client: ClientId) {
    let files = state
        .with_project(ProjectStore::list_projects)
        .unwrap_or_else(|e| {
            log::warn!("Cannot list projects: {e}");
            Vec::new()
        });
    state.send_to(client, &Frame::ProjectList(files));
}

fn load_project(state: &AppState, client: ClientId, name: &str) {
    match state.with_project_mut(|project| project.switch_to(name)) {
        Ok(loaded) => {
            log::info!("Switched to project '{loaded}'");
            state.send_to(client, &Frame::ProjectLoaded(loaded.clone()));
            announce_active_project(state, loaded);
        }
        Err(e) => project_error(state, client, e.into()),
    }
}

fn save_as(state: &AppState, client: ClientId, name: &str) {
    match state.with_project(|project| project.save_as(name)) {
        Ok(saved) => state.send_to(client, &Frame::ProjectSaved(saved)),
        Err(e) => project_error(state, client, e.into()),
    }
}
