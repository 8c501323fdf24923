//! The pdfium render thread.
//!
//! pdfium is bound once, on first use, and lives on this thread for the
//! rest of the process. Jobs come in over a channel and answer on a
//! oneshot, so async callers never block.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

use anyhow::Context as _;
use log::{debug, info, warn};
use pdfium_render::prelude::{PdfBitmapFormat, PdfRenderConfig, Pdfium};
use tokio::sync::oneshot;

use crate::{RgbaBitmap, bgra_to_rgba};

pub(crate) enum RenderJob {
    Check {
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
    Page {
        bytes: Arc<Vec<u8>>,
        page_index: u32,
        scale: f32,
        reply: oneshot::Sender<anyhow::Result<RgbaBitmap>>,
    },
}

/// Handle to the render thread. Clones share the thread, which exits once
/// the last handle is gone.
#[derive(Debug, Clone)]
pub(crate) struct RenderWorker {
    jobs: Option<mpsc::Sender<RenderJob>>,
}

impl RenderWorker {
    pub(crate) fn spawn() -> Self {
        let (jobs, inbox) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("pdfium-render".to_string())
            .spawn(move || run(inbox));
        match spawned {
            Ok(_) => Self { jobs: Some(jobs) },
            Err(err) => {
                warn!("could not start the render thread: {err}");
                Self { jobs: None }
            }
        }
    }

    pub(crate) fn submit(&self, job: RenderJob) -> anyhow::Result<()> {
        let jobs = self.jobs.as_ref().context("render thread is not running")?;
        jobs.send(job)
            .map_err(|_| anyhow::anyhow!("render thread has stopped"))
    }
}

enum PdfiumState {
    Unbound,
    Bound(Pdfium),
    Missing(String),
}

impl PdfiumState {
    fn get(&mut self) -> anyhow::Result<&Pdfium> {
        if matches!(self, PdfiumState::Unbound) {
            *self = match bind_pdfium() {
                Ok(pdfium) => PdfiumState::Bound(pdfium),
                Err(err) => {
                    warn!("pdfium unavailable: {err:#}");
                    PdfiumState::Missing(format!("{err:#}"))
                }
            };
        }
        match self {
            PdfiumState::Bound(pdfium) => Ok(pdfium),
            PdfiumState::Missing(err) => Err(anyhow::anyhow!(err.clone())),
            PdfiumState::Unbound => Err(anyhow::anyhow!("pdfium is not bound")),
        }
    }
}

fn run(inbox: mpsc::Receiver<RenderJob>) {
    let mut pdfium = PdfiumState::Unbound;
    while let Ok(job) = inbox.recv() {
        let delivered = match job {
            RenderJob::Check { reply } => reply.send(pdfium.get().map(|_| ())).is_ok(),
            RenderJob::Page {
                bytes,
                page_index,
                scale,
                reply,
            } => {
                let result = pdfium
                    .get()
                    .and_then(|pdfium| render_bitmap(pdfium, &bytes, page_index, scale));
                reply.send(result).is_ok()
            }
        };
        if !delivered {
            debug!("render result dropped, caller went away");
        }
    }
    debug!("render thread exiting");
}

fn render_bitmap(
    pdfium: &Pdfium,
    bytes: &[u8],
    page_index: u32,
    scale: f32,
) -> anyhow::Result<RgbaBitmap> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| anyhow::anyhow!(err))
        .context("load pdf into pdfium")?;

    let page_index = u16::try_from(page_index).context("page index out of range")?;
    let page = document
        .pages()
        .get(page_index)
        .map_err(|err| anyhow::anyhow!(err))
        .with_context(|| format!("get page {page_index}"))?;

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .render_form_data(false)
        .render_annotations(true)
        .set_format(PdfBitmapFormat::BGRA);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|err| anyhow::anyhow!(err))
        .context("rasterize page")?;

    let width = usize::try_from(bitmap.width()).unwrap_or(0);
    let height = usize::try_from(bitmap.height()).unwrap_or(0);
    Ok(RgbaBitmap {
        width,
        height,
        stride: width.saturating_mul(4),
        pixels: bgra_to_rgba(&bitmap.as_raw_bytes(), width, height),
    })
}

/// Where pdfium may live, most specific first.
fn library_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = std::env::var_os("PDFSHELF_PDFIUM_LIB_PATH") {
        candidates.push(PathBuf::from(path));
    }

    let mut dirs = Vec::new();
    if let Some(dir) = std::env::var_os("PDFSHELF_PDFIUM_DIR") {
        dirs.push(PathBuf::from(dir));
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
    {
        dirs.push(dir);
    }
    dirs.push(PathBuf::from(".pdfium"));

    candidates.extend(
        dirs.iter()
            .map(|dir| Pdfium::pdfium_platform_library_name_at_path(dir.as_path())),
    );
    candidates
}

fn bind_pdfium() -> anyhow::Result<Pdfium> {
    for path in library_candidates() {
        match Pdfium::bind_to_library(&path) {
            Ok(bindings) => {
                info!("bound pdfium from {}", path.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(err) => debug!("no usable pdfium at {}: {err}", path.display()),
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|err| {
        anyhow::anyhow!(
            "pdfium not found ({err}). Install it, place {} next to pdfshelf, \
             or set PDFSHELF_PDFIUM_LIB_PATH",
            Pdfium::pdfium_platform_library_name().to_string_lossy()
        )
    })?;
    info!("bound system pdfium");
    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_pdfium_dir_is_the_last_candidate() {
        let candidates = library_candidates();
        assert!(!candidates.is_empty());
        assert!(
            candidates
                .last()
                .is_some_and(|path| path.starts_with(".pdfium"))
        );
    }

    #[test]
    fn binding_outcome_is_kept_after_first_use() {
        let mut state = PdfiumState::Unbound;
        let first = state.get().is_ok();
        assert!(!matches!(state, PdfiumState::Unbound));
        assert_eq!(state.get().is_ok(), first);
    }

    #[tokio::test]
    async fn jobs_are_answered_after_submit() -> anyhow::Result<()> {
        let worker = RenderWorker::spawn();
        let (reply, answer) = oneshot::channel();
        worker.submit(RenderJob::Page {
            bytes: Arc::new(b"not a pdf".to_vec()),
            page_index: 0,
            scale: 1.0,
            reply,
        })?;
        // Fails either way: no pdfium, or pdfium rejects the bytes.
        assert!(answer.await?.is_err());
        Ok(())
    }
}
