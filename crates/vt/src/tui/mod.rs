//! ステータスモニター
//!
//! 1本のイベントループが [`app::Monitor`] を所有し、非同期処理はすべて
//! チャネル経由のメッセージで結果を返します。

pub mod app;
pub mod fetch;
pub mod terminal;
pub mod view;

use crate::context::AppContext;
use app::{Command, Monitor, Msg};
use crossterm::event::{self, Event, KeyEventKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vt_core::Catalog;
use vt_provider::Registry;

/// スピナーとトーストの更新間隔
const TICK_RATE: Duration = Duration::from_millis(100);

/// [`Command`] をタスクとして実行する
struct Executor {
    catalog: Arc<Catalog>,
    registry: Registry,
    tx: UnboundedSender<Msg>,
    cancel: CancellationToken,
    query_timeout: Duration,
}

impl Executor {
    fn execute(&self, command: Command) {
        match command {
            Command::Fetch => {
                let catalog = self.catalog.clone();
                let registry = self.registry.clone();
                let tx = self.tx.clone();
                let cancel = self.cancel.clone();
                let timeout = self.query_timeout;
                tokio::spawn(async move {
                    let rows = fetch::fetch_rows(&catalog, &registry, timeout, &cancel).await;
                    if !cancel.is_cancelled() {
                        tx.send(Msg::Snapshot(rows)).ok();
                    }
                });
            }
            Command::Run {
                action,
                template_id,
                provider,
            } => {
                info!(template = %template_id, provider = %provider, ?action, "Running action");
                let catalog = self.catalog.clone();
                let registry = self.registry.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let msg =
                        fetch::run_action(&catalog, &registry, action, template_id, provider).await;
                    tx.send(msg).ok();
                });
            }
            Command::ScheduleTick(delay) => {
                let tx = self.tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            tx.send(Msg::WatchTick).ok();
                        }
                    }
                });
            }
            Command::Quit => self.cancel.cancel(),
        }
    }

    fn dispatch(&self, commands: Vec<Command>) {
        for command in commands {
            self.execute(command);
        }
    }
}

/// キー入力を読み取るスレッド
///
/// crossterm の読み取りはブロッキングのため、専用スレッドでポーリングします。
fn spawn_input_reader(tx: UnboundedSender<Msg>, cancel: CancellationToken) {
    std::thread::spawn(move || {
        while !cancel.is_cancelled() {
            match event::poll(TICK_RATE) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read()
                        && key.kind == KeyEventKind::Press
                        && tx.send(Msg::Key(key)).is_err()
                    {
                        break;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to poll terminal events");
                    break;
                }
            }
        }
    });
}

/// モニターを起動し、終了またはキャンセルされるまでブロックする
pub async fn run_monitor(
    ctx: AppContext,
    watch: bool,
    deadline: Option<Duration>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    if let Some(deadline) = deadline {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            info!(?deadline, "Monitor deadline reached");
            cancel.cancel();
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (tx, mut rx) = unbounded_channel();
    spawn_input_reader(tx.clone(), cancel.clone());

    let executor = Executor {
        catalog: ctx.catalog.clone(),
        registry: ctx.registry.clone(),
        tx,
        cancel: cancel.clone(),
        query_timeout: ctx.settings.monitor.query_timeout(),
    };
    let mut monitor = Monitor::new(watch, &ctx.settings.monitor);

    info!(watch, "Starting status monitor");
    let mut terminal = terminal::setup_terminal()?;
    let result = event_loop(&mut terminal, &mut monitor, &executor, &mut rx).await;
    cancel.cancel();
    terminal::restore_terminal(&mut terminal)?;

    if let Some(error) = &monitor.last_error {
        info!(error = %error, "Monitor exited with an action error");
    }
    result
}

async fn event_loop(
    terminal: &mut terminal::Tui,
    monitor: &mut Monitor,
    executor: &Executor,
    rx: &mut UnboundedReceiver<Msg>,
) -> anyhow::Result<()> {
    executor.dispatch(monitor.init());
    let mut ticker = tokio::time::interval(TICK_RATE);

    loop {
        terminal.draw(|f| view::draw_ui(f, monitor))?;

        tokio::select! {
            _ = executor.cancel.cancelled() => break,
            Some(msg) = rx.recv() => executor.dispatch(monitor.update(msg)),
            _ = ticker.tick() => executor.dispatch(monitor.update(Msg::Tick(Instant::now()))),
        }

        if monitor.should_quit {
            break;
        }
    }

    Ok(())
}
