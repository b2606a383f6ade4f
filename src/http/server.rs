use anyhow::anyhow;
use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use std::{
    io::Read,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    config::HttpConfig,
    domain::track::Track,
    http::error::ApiError,
    player::{
        Player,
        surface::{ActiveSource, SourceLease, SourceLookup},
    },
    storage::{error::StorageError, fs::is_music_file},
};

pub struct HttpServer {
    player: Arc<Mutex<Player>>,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(player: Player, config: HttpConfig) -> Self {
        Self {
            player: Arc::new(Mutex::new(player)),
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (GET) (/) => {
                Ok(Self::handle_player_page())
            },
            (GET) (/api/state) => {
                self.handle_state()
            },
            (POST) (/api/upload) => {
                self.handle_upload(request)
            },
            (POST) (/api/select) => {
                self.handle_select(request)
            },
            (POST) (/api/next) => {
                self.handle_next()
            },
            (POST) (/api/completed) => {
                self.handle_completed()
            },
            (POST) (/api/position) => {
                self.handle_position(request)
            },
            (GET) (/api/stream/{lease: u64}) => {
                self.handle_stream(SourceLease(lease), request)
            },
            _ => Ok(Response::empty_404())
        );

        let response = result.unwrap_or_else(ApiError::into_response);
        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn lock(&self) -> Result<MutexGuard<'_, Player>, ApiError> {
        self.player.lock().map_err(|e| {
            ApiError::from(StorageError::Internal(anyhow!(
                "Could not access player under lock: {e}"
            )))
        })
    }

    fn handle_player_page() -> Response {
        Response::html(include_str!("../../html/player.html"))
    }

    fn handle_state(&self) -> Result<Response, ApiError> {
        let player = self.lock()?;
        Ok(Response::json(&StateResponse::from_player(&player)))
    }

    /// stores the raw request body under `?name=`, audio only
    fn handle_upload(&self, request: &Request) -> Result<Response, ApiError> {
        let name = request
            .get_param("name")
            .ok_or_else(|| ApiError::BadRequest("missing track name".into()))?;

        let is_audio = request
            .header("Content-Type")
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("audio/"))
            || is_music_file(Path::new(&name));
        if !is_audio {
            return Err(ApiError::BadRequest(format!(
                "{name} is not an audio file"
            )));
        }

        let mut data = Vec::new();
        request
            .data()
            .ok_or_else(|| ApiError::BadRequest("request body already consumed".into()))?
            .read_to_end(&mut data)
            .map_err(StorageError::Fs)?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("empty upload".into()));
        }

        let mut player = self.lock()?;
        player.upload(&name, data)?;
        Ok(Response::json(&StateResponse::from_player(&player)))
    }

    fn handle_select(&self, request: &Request) -> Result<Response, ApiError> {
        let body: SelectRequest = rouille::input::json_input(request)
            .map_err(|e| ApiError::BadRequest(format!("invalid select request: {e}")))?;

        let mut player = self.lock()?;
        match (body.index, body.name.as_deref()) {
            (Some(index), name) => player.select_at(index, name)?,
            (None, Some(name)) => player.select(name)?,
            (None, None) => {
                return Err(ApiError::BadRequest(
                    "select needs a playlist index or a track name".into(),
                ));
            }
        };
        Ok(Response::json(&StateResponse::from_player(&player)))
    }

    fn handle_next(&self) -> Result<Response, ApiError> {
        let mut player = self.lock()?;
        player.skip()?;
        Ok(Response::json(&StateResponse::from_player(&player)))
    }

    fn handle_completed(&self) -> Result<Response, ApiError> {
        let mut player = self.lock()?;
        player.completed()?;
        Ok(Response::json(&StateResponse::from_player(&player)))
    }

    fn handle_position(&self, request: &Request) -> Result<Response, ApiError> {
        let body: PositionRequest = rouille::input::json_input(request)
            .map_err(|e| ApiError::BadRequest(format!("invalid position: {e}")))?;

        let mut player = self.lock()?;
        let current = player.current_source().map(|source| source.lease);
        match body.lease.map(SourceLease) {
            Some(lease) if Some(lease) != current => {
                log::debug!("ignoring position for released source {lease}");
            }
            _ => player.record_progress(body.seconds)?,
        }
        Ok(Response::empty_204())
    }

    fn handle_stream(&self, lease: SourceLease, request: &Request) -> Result<Response, ApiError> {
        let track = match self.lock()?.source(lease) {
            SourceLookup::Active(source) => source.track.clone(),
            SourceLookup::Released => {
                return Err(ApiError::Gone(format!("source {lease} was released")));
            }
            SourceLookup::Unknown => {
                return Err(ApiError::NotFound(format!("source {lease} not found")));
            }
        };

        let mime = Self::mime_for_track(&track);
        let len = track.data.len();
        log::debug!(
            "STREAM {} -> {}, {} bytes, MIME type: {}",
            lease,
            track.name,
            len,
            mime
        );

        let response = match ByteRange::parse(request.header("Range"), len) {
            ByteRange::Full => Response::from_data(mime, track.data.to_vec()),
            ByteRange::Partial { start, end } => {
                Response::from_data(mime, track.data[start..=end].to_vec())
                    .with_status_code(206)
                    .with_additional_header("Content-Range", format!("bytes {start}-{end}/{len}"))
            }
            ByteRange::Unsatisfiable => Response::empty_400()
                .with_status_code(416)
                .with_additional_header("Content-Range", format!("bytes */{len}")),
        };

        Ok(response
            .with_additional_header("Accept-Ranges", "bytes")
            .with_additional_header("ETag", format!("\"{}\"", track.digest))
            .with_additional_header("Cache-Control", "no-store"))
    }

    fn mime_for_track(track: &Track) -> String {
        let path = Path::new(track.name.as_str());
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .map(|s| s.to_lowercase());
        let default = || {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string()
        };
        ext.and_then(|ext| Self::mime_from_ext(ext.as_str()))
            .unwrap_or_else(default)
    }

    /// Map file extension (without dot) to proper MIME type for browser playback.
    /// Returns None if the extension is not recognized.
    pub fn mime_from_ext(ext: &str) -> Option<String> {
        match ext {
            "m4a" => Some("audio/x-m4a".to_string()), // Safari iOS compatible
            "aac" => Some("audio/aac".to_string()),
            "mp3" => Some("audio/mpeg".to_string()),
            "wav" => Some("audio/wav".to_string()),
            "ogg" => Some("audio/ogg".to_string()),
            "flac" => Some("audio/flac".to_string()),
            _ => None,
        }
    }
}

/// Single `bytes=` range of a `Range` header, inclusive on both ends.
///
/// Headers that can't be parsed, or that ask for several ranges, get the whole body.
#[derive(Debug, PartialEq, Eq)]
enum ByteRange {
    Full,
    Partial { start: usize, end: usize },
    Unsatisfiable,
}

impl ByteRange {
    fn parse(header: Option<&str>, len: usize) -> Self {
        let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return ByteRange::Full;
        };
        if spec.contains(',') {
            return ByteRange::Full;
        }
        let Some((start, end)) = spec.split_once('-') else {
            return ByteRange::Full;
        };

        let (start, end) = match (start.trim(), end.trim()) {
            ("", "") => return ByteRange::Full,
            // suffix: last N bytes
            ("", suffix) => match suffix.parse::<usize>() {
                Ok(0) => return ByteRange::Unsatisfiable,
                Ok(n) => (len.saturating_sub(n), len.saturating_sub(1)),
                Err(_) => return ByteRange::Full,
            },
            (start, "") => match start.parse::<usize>() {
                Ok(s) => (s, len.saturating_sub(1)),
                Err(_) => return ByteRange::Full,
            },
            (start, end) => match (start.parse::<usize>(), end.parse::<usize>()) {
                (Ok(s), Ok(e)) if s <= e => (s, e.min(len.saturating_sub(1))),
                _ => return ByteRange::Full,
            },
        };

        if len == 0 || start >= len {
            ByteRange::Unsatisfiable
        } else {
            ByteRange::Partial { start, end }
        }
    }
}

/// Picks a playlist entry by position, `name` guards against a stale list.
/// Without an index the first entry with `name` is picked.
#[derive(Deserialize)]
struct SelectRequest {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct PositionRequest {
    seconds: f64,
    /// source the position was measured on
    #[serde(default)]
    lease: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct StateResponse {
    tracks: Vec<TrackResponse>,
    now_playing: Option<NowPlayingResponse>,
    message: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct TrackResponse {
    name: String,
    size: usize,
    digest: String,
}

#[derive(Serialize, Deserialize)]
struct NowPlayingResponse {
    name: String,
    lease: u64,
    stream_url: String,
    resume_at: Option<f64>,
}

impl StateResponse {
    fn from_player(player: &Player) -> Self {
        Self {
            tracks: player
                .playlist()
                .tracks()
                .iter()
                .map(TrackResponse::from_domain)
                .collect(),
            now_playing: player.current_source().map(NowPlayingResponse::from_source),
            message: player.message().map(str::to_string),
        }
    }
}

impl TrackResponse {
    fn from_domain(track: &Track) -> Self {
        Self {
            name: track.name.to_string(),
            size: track.size(),
            digest: track.digest.to_hex(),
        }
    }
}

impl NowPlayingResponse {
    fn from_source(source: &ActiveSource) -> Self {
        Self {
            name: source.track.name.to_string(),
            lease: source.lease.0,
            stream_url: format!("/api/stream/{}", source.lease),
            resume_at: source.resume_at,
        }
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
