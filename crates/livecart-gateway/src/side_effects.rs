//! Fire-and-forget worker for slow side effects of a write: label printing
//! and streaming-provider calls. Submitting never blocks the HTTP response
//! or the publish that precedes it.

use std::path::PathBuf;
use std::sync::Arc;

use livecart_core::types::{Order, StreamRoom};
use livecart_protocol::frames::StreamStateKind;
use livecart_store::{Collection, Repository, RepositoryExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::publish::Publisher;
use crate::streaming::StreamProvider;

const QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub enum SideEffect {
    PrintLabel(Order),
    OpenRoom(StreamRoom),
    CloseRoom(StreamRoom),
}

impl SideEffect {
    fn name(&self) -> &'static str {
        match self {
            SideEffect::PrintLabel(_) => "print_label",
            SideEffect::OpenRoom(_) => "open_room",
            SideEffect::CloseRoom(_) => "close_room",
        }
    }
}

pub trait LabelPrinter: Send + Sync {
    fn print(&self, order: &Order) -> std::io::Result<()>;
}

/// Writes one `<order-id>.txt` per label into a spool directory watched by
/// the print station. Without a directory the label is only logged.
pub struct SpoolPrinter {
    spool_dir: Option<PathBuf>,
}

impl SpoolPrinter {
    pub fn new(spool_dir: Option<PathBuf>) -> Self {
        Self { spool_dir }
    }
}

impl LabelPrinter for SpoolPrinter {
    fn print(&self, order: &Order) -> std::io::Result<()> {
        let label = render_label(order);
        match &self.spool_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}.txt", order.id));
                std::fs::write(&path, label)?;
                info!(order_id = %order.id, path = %path.display(), "label spooled");
            }
            None => info!(order_id = %order.id, %label, "label (no spool dir configured)"),
        }
        Ok(())
    }
}

pub fn render_label(order: &Order) -> String {
    let price = format!("{:.2}", order.price).replace('.', ",");
    format!(
        "Bestellung {id}\nKunde: {customer}\nArtikel: {product}\nGröße: {size}\nMenge: {qty}\nPreis: {price}\nZeit: {at}\n",
        id = order.id,
        customer = order.customer_id,
        product = order.product_name,
        size = order.size,
        qty = order.quantity,
        at = order.created_at,
    )
}

/// Handle for submitting side effects. Cheap to clone.
#[derive(Clone)]
pub struct SideEffects {
    tx: mpsc::Sender<SideEffect>,
}

impl SideEffects {
    pub fn spawn(
        printer: Arc<dyn LabelPrinter>,
        streams: Arc<dyn StreamProvider>,
        publisher: Publisher,
        repo: Arc<dyn Repository>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<SideEffect>(QUEUE_DEPTH);
        let worker = Worker {
            printer,
            streams,
            publisher,
            repo,
        };
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                worker.run(job).await;
            }
            debug!("side-effect worker stopped");
        });
        (Self { tx }, handle)
    }

    /// Queue a job. Returns `false` when it was dropped.
    pub fn submit(&self, job: SideEffect) -> bool {
        let name = job.name();
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(job = name, "side-effect queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(job = name, "side-effect worker gone, dropping job");
                false
            }
        }
    }
}

struct Worker {
    printer: Arc<dyn LabelPrinter>,
    streams: Arc<dyn StreamProvider>,
    publisher: Publisher,
    repo: Arc<dyn Repository>,
}

impl Worker {
    async fn run(&self, job: SideEffect) {
        match job {
            SideEffect::PrintLabel(order) => {
                if let Err(e) = self.printer.print(&order) {
                    error!(order_id = %order.id, error = %e, "label printing failed");
                }
            }
            SideEffect::OpenRoom(mut room) => match self.streams.create_room(&room).await {
                Ok(meta) => {
                    match self.repo.update_as::<StreamRoom>(
                        Collection::StreamRooms,
                        &room.id,
                        json!({ "provider": meta.clone() }),
                    ) {
                        Ok(stored) => room = stored,
                        Err(e) => {
                            warn!(room_id = %room.id, error = %e, "could not store provider metadata");
                            room.provider = meta;
                        }
                    }
                    self.publisher.publish_stream(StreamStateKind::Started, &room);
                }
                Err(e) => error!(room_id = %room.id, error = %e, "stream room creation failed"),
            },
            SideEffect::CloseRoom(room) => match self.streams.delete_room(&room).await {
                Ok(()) => self.publisher.publish_stream(StreamStateKind::Ended, &room),
                Err(e) => error!(room_id = %room.id, error = %e, "stream room deletion failed"),
            },
        }
    }
}
