//! ステータスモニターの状態と遷移
//!
//! 状態はすべて [`Monitor`] が持ち、[`Monitor::update`] はメッセージを受けて
//! 実行すべき [`Command`] を返すだけの純粋な遷移関数です。

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};
use vt_config::MonitorSettings;
use vt_core::Template;
use vt_provider::{Health, RunState, StatusReport, endpoints};

/// テンプレート × プロバイダー 1件分の表示行
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    pub template_id: String,
    pub template_name: String,
    pub author: String,
    pub technologies: Vec<String>,
    pub tags: Vec<String>,
    pub provider: String,
    pub state: RunState,
    pub health: Health,
    pub containers: usize,
    pub ports: Vec<String>,
    /// 状態取得に失敗した場合のエラー
    pub error: Option<String>,
}

impl TargetRow {
    fn base(template: &Template, provider: &str) -> Self {
        Self {
            template_id: template.id.clone(),
            template_name: template.info.name.clone(),
            author: template.info.author.clone(),
            technologies: template.info.technologies.clone(),
            tags: template.info.tags.clone(),
            provider: provider.to_string(),
            state: RunState::Stopped,
            health: Health::Unknown,
            containers: 0,
            ports: Vec::new(),
            error: None,
        }
    }

    pub fn from_report(template: &Template, provider: &str, report: &StatusReport) -> Self {
        Self {
            state: report.run_state(),
            health: report.health(),
            containers: report.container_count(),
            ports: report.ports(),
            ..Self::base(template, provider)
        }
    }

    /// 問い合わせに失敗した行は stopped / unknown として扱う
    pub fn failed(template: &Template, provider: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(template, provider)
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn status_label(&self) -> String {
        match (self.state, self.health) {
            (RunState::Running, Health::Unknown) => "Running".to_string(),
            (RunState::Running, health) => format!("Running ({})", health),
            (RunState::Stopped, _) if self.error.is_some() => "Unknown".to_string(),
            (RunState::Stopped, _) => "Stopped".to_string(),
        }
    }

    pub fn provider_short(&self) -> &str {
        match self.provider.as_str() {
            "docker-compose" => "dc",
            other => other,
        }
    }

    pub fn endpoints(&self) -> Vec<String> {
        endpoints(&self.ports)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Acting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Start => "起動",
            Action::Stop => "停止",
            Action::Restart => "再起動",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Msg {
    Key(KeyEvent),
    /// 全行の最新状態（最後に届いたものが優先）
    Snapshot(Vec<TargetRow>),
    ActionFinished {
        action: Action,
        template_id: String,
        result: Result<(), String>,
    },
    WatchTick,
    /// 描画用の定期タイマー
    Tick(Instant),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fetch,
    Run {
        action: Action,
        template_id: String,
        provider: String,
    },
    ScheduleTick(Duration),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub text: String,
    pub kind: ToastKind,
    pub expires_at: Instant,
}

pub struct Monitor {
    pub rows: Vec<TargetRow>,
    pub selected: usize,
    pub phase: Phase,
    pub watch: bool,
    pub show_help: bool,
    pub show_info: bool,
    pub toast: Option<Toast>,
    pub last_error: Option<String>,
    pub last_updated: Option<DateTime<Local>>,
    /// 実行中の操作の説明
    pub pending: Option<String>,
    pub spinner: usize,
    pub should_quit: bool,
    tick_pending: bool,
    refresh_interval: Duration,
    toast_duration: Duration,
}

impl Monitor {
    pub fn new(watch: bool, settings: &MonitorSettings) -> Self {
        Self {
            rows: Vec::new(),
            selected: 0,
            phase: Phase::Loading,
            watch,
            show_help: false,
            show_info: false,
            toast: None,
            last_error: None,
            last_updated: None,
            pending: None,
            spinner: 0,
            should_quit: false,
            tick_pending: false,
            refresh_interval: settings.refresh_interval(),
            toast_duration: settings.toast_duration(),
        }
    }

    pub fn init(&mut self) -> Vec<Command> {
        self.phase = Phase::Loading;
        vec![Command::Fetch]
    }

    pub fn selected_row(&self) -> Option<&TargetRow> {
        self.rows.get(self.selected)
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::Snapshot(rows) => self.apply_snapshot(rows),
            Msg::ActionFinished {
                action,
                template_id,
                result,
            } => self.finish_action(action, &template_id, result),
            Msg::WatchTick => {
                self.tick_pending = false;
                // 取得中・操作中なら、その完了時に次の取得が走る
                if self.phase != Phase::Ready {
                    return Vec::new();
                }
                self.phase = Phase::Loading;
                vec![Command::Fetch]
            }
            Msg::Tick(now) => {
                self.spinner = self.spinner.wrapping_add(1);
                if self.toast.as_ref().is_some_and(|t| t.expires_at <= now) {
                    self.toast = None;
                }
                Vec::new()
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => return self.quit(),
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return Vec::new();
            }
            KeyCode::Char('q') | KeyCode::Esc => return self.quit(),
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                return Vec::new();
            }
            _ => {}
        }

        if self.phase == Phase::Loading {
            return Vec::new();
        }

        match key.code {
            KeyCode::Char('r') if ctrl => self.refresh(),
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.rows.len() {
                    self.selected += 1;
                }
                Vec::new()
            }
            KeyCode::Char('i') => {
                self.show_info = !self.show_info;
                Vec::new()
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let action = match self.selected_row() {
                    Some(row) if row.is_running() => Action::Stop,
                    _ => Action::Start,
                };
                self.begin_action(action)
            }
            KeyCode::Char('a') => self.begin_action(Action::Start),
            KeyCode::Char('s') => self.begin_action(Action::Stop),
            KeyCode::Char('r') => self.begin_action(Action::Restart),
            _ => Vec::new(),
        }
    }

    fn quit(&mut self) -> Vec<Command> {
        self.should_quit = true;
        vec![Command::Quit]
    }

    fn refresh(&mut self) -> Vec<Command> {
        if self.phase != Phase::Ready {
            return Vec::new();
        }
        self.phase = Phase::Loading;
        vec![Command::Fetch]
    }

    fn begin_action(&mut self, action: Action) -> Vec<Command> {
        if self.phase == Phase::Acting {
            self.show_toast("別の操作を実行中です", ToastKind::Info);
            return Vec::new();
        }

        let Some(row) = self.selected_row() else {
            return Vec::new();
        };
        let pending = format!("{} を{}中...", row.template_id, action.label());
        let command = Command::Run {
            action,
            template_id: row.template_id.clone(),
            provider: row.provider.clone(),
        };
        self.pending = Some(pending);
        self.phase = Phase::Acting;
        vec![command]
    }

    fn finish_action(
        &mut self,
        action: Action,
        template_id: &str,
        result: Result<(), String>,
    ) -> Vec<Command> {
        self.pending = None;
        match result {
            Ok(()) => self.show_toast(
                format!("✓ {} を{}しました", template_id, action.label()),
                ToastKind::Success,
            ),
            Err(error) => {
                self.show_toast(
                    format!("✗ {} の{}に失敗しました: {}", template_id, action.label(), error),
                    ToastKind::Error,
                );
                self.last_error = Some(error);
            }
        }

        self.phase = Phase::Loading;
        vec![Command::Fetch]
    }

    fn apply_snapshot(&mut self, rows: Vec<TargetRow>) -> Vec<Command> {
        self.rows = rows;
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
        self.last_updated = Some(Local::now());
        if self.phase == Phase::Loading {
            self.phase = Phase::Ready;
        }

        let failures: Vec<(&str, &str)> = self
            .rows
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| (r.template_id.as_str(), e)))
            .collect();
        if let Some((template_id, error)) = failures.first() {
            let error = format!("{}: {}", template_id, error);
            let text = format!("✗ {}件の状態取得に失敗しました: {}", failures.len(), error);
            self.show_toast(text, ToastKind::Error);
            self.last_error = Some(error);
        }

        if self.watch && !self.tick_pending {
            self.tick_pending = true;
            return vec![Command::ScheduleTick(self.refresh_interval)];
        }
        Vec::new()
    }

    fn show_toast(&mut self, text: impl Into<String>, kind: ToastKind) {
        self.toast = Some(Toast {
            text: text.into(),
            kind,
            expires_at: Instant::now() + self.toast_duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vt_core::Info;
    use vt_provider::ServiceStatus;

    fn key(code: KeyCode) -> Msg {
        Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> Msg {
        Msg::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn template(id: &str) -> Template {
        Template {
            id: id.to_string(),
            info: Info {
                name: format!("{} lab", id),
                ..Default::default()
            },
            providers: BTreeMap::new(),
        }
    }

    fn row(id: &str, running: bool) -> TargetRow {
        let services = if running {
            vec![ServiceStatus {
                id: "0123456789ab".to_string(),
                name: format!("vt-{}-web", id),
                service: "web".to_string(),
                state: "running".to_string(),
                status: "Up".to_string(),
                health: None,
                ports: vec!["3000:3000/tcp".to_string()],
                created: None,
            }]
        } else {
            Vec::new()
        };
        let report = StatusReport::new(format!("vt-{}", id), services);
        TargetRow::from_report(&template(id), "docker-compose", &report)
    }

    fn ready(watch: bool) -> Monitor {
        let mut monitor = Monitor::new(watch, &MonitorSettings::default());
        monitor.init();
        monitor.update(Msg::Snapshot(vec![row("dvwa", false), row("juice-shop", true)]));
        monitor
    }

    #[test]
    fn test_init_fetches() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        assert_eq!(monitor.init(), vec![Command::Fetch]);
        assert_eq!(monitor.phase, Phase::Loading);
    }

    #[test]
    fn test_loading_ignores_navigation_and_actions() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        monitor.init();
        monitor.rows = vec![row("dvwa", false), row("juice-shop", false)];

        assert!(monitor.update(key(KeyCode::Down)).is_empty());
        assert_eq!(monitor.selected, 0);
        assert!(monitor.update(key(KeyCode::Char('a'))).is_empty());
        assert!(monitor.update(ctrl('r')).is_empty());
        assert_eq!(monitor.phase, Phase::Loading);
    }

    #[test]
    fn test_help_and_quit_work_while_loading() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        monitor.init();

        monitor.update(key(KeyCode::Char('?')));
        assert!(monitor.show_help);

        assert_eq!(monitor.update(key(KeyCode::Char('q'))), vec![Command::Quit]);
        assert!(monitor.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut monitor = ready(false);
        assert_eq!(monitor.update(ctrl('c')), vec![Command::Quit]);
        assert!(monitor.should_quit);
    }

    #[test]
    fn test_esc_closes_help_first() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Char('?')));
        assert!(monitor.update(key(KeyCode::Esc)).is_empty());
        assert!(!monitor.show_help);
        assert!(!monitor.should_quit);
    }

    #[test]
    fn test_one_shot_does_not_reschedule() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        monitor.init();
        let commands = monitor.update(Msg::Snapshot(vec![row("dvwa", false)]));
        assert!(commands.is_empty());
        assert_eq!(monitor.phase, Phase::Ready);
        assert!(monitor.last_updated.is_some());
    }

    #[test]
    fn test_watch_reschedules_after_snapshot() {
        let mut monitor = Monitor::new(true, &MonitorSettings::default());
        monitor.init();
        let commands = monitor.update(Msg::Snapshot(vec![row("dvwa", false)]));
        assert_eq!(
            commands,
            vec![Command::ScheduleTick(Duration::from_millis(2000))]
        );

        // タイマー待機中に手動更新しても二重に予約しない
        monitor.update(ctrl('r'));
        assert!(monitor.update(Msg::Snapshot(vec![])).is_empty());

        assert_eq!(monitor.update(Msg::WatchTick), vec![Command::Fetch]);
        assert_eq!(monitor.phase, Phase::Loading);
        assert_eq!(
            monitor.update(Msg::Snapshot(vec![])),
            vec![Command::ScheduleTick(Duration::from_millis(2000))]
        );
    }

    #[test]
    fn test_watch_tick_while_acting_waits() {
        let mut monitor = ready(true);
        monitor.update(key(KeyCode::Char('a')));
        assert!(monitor.update(Msg::WatchTick).is_empty());
        assert_eq!(monitor.phase, Phase::Acting);
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Up));
        assert_eq!(monitor.selected, 0);
        monitor.update(key(KeyCode::Char('j')));
        monitor.update(key(KeyCode::Down));
        assert_eq!(monitor.selected, 1);
        monitor.update(key(KeyCode::Char('k')));
        assert_eq!(monitor.selected, 0);
    }

    #[test]
    fn test_snapshot_clamps_selection() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Down));
        monitor.update(ctrl('r'));
        monitor.update(Msg::Snapshot(vec![row("dvwa", false)]));
        assert_eq!(monitor.selected, 0);
    }

    #[test]
    fn test_toggle_picks_action_from_state() {
        let mut monitor = ready(false);
        assert_eq!(
            monitor.update(key(KeyCode::Enter)),
            vec![Command::Run {
                action: Action::Start,
                template_id: "dvwa".to_string(),
                provider: "docker-compose".to_string(),
            }]
        );

        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Down));
        assert_eq!(
            monitor.update(key(KeyCode::Char(' '))),
            vec![Command::Run {
                action: Action::Stop,
                template_id: "juice-shop".to_string(),
                provider: "docker-compose".to_string(),
            }]
        );
        assert_eq!(monitor.phase, Phase::Acting);
        assert!(monitor.pending.is_some());
    }

    #[test]
    fn test_second_action_is_rejected_with_toast() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Char('r')));
        assert!(monitor.update(key(KeyCode::Char('s'))).is_empty());
        let toast = monitor.toast.as_ref().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
    }

    #[test]
    fn test_action_success_toasts_and_refetches() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Char('a')));

        let commands = monitor.update(Msg::ActionFinished {
            action: Action::Start,
            template_id: "dvwa".to_string(),
            result: Ok(()),
        });

        assert_eq!(commands, vec![Command::Fetch]);
        assert_eq!(monitor.phase, Phase::Loading);
        assert!(monitor.pending.is_none());
        assert_eq!(monitor.toast.as_ref().unwrap().kind, ToastKind::Success);
        assert!(monitor.last_error.is_none());
    }

    #[test]
    fn test_action_failure_sets_last_error() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Char('a')));

        let commands = monitor.update(Msg::ActionFinished {
            action: Action::Start,
            template_id: "dvwa".to_string(),
            result: Err("Container runtime unavailable".to_string()),
        });

        assert_eq!(commands, vec![Command::Fetch]);
        assert_eq!(monitor.toast.as_ref().unwrap().kind, ToastKind::Error);
        assert_eq!(
            monitor.last_error.as_deref(),
            Some("Container runtime unavailable")
        );
    }

    #[test]
    fn test_failed_status_query_sets_last_error() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        monitor.init();

        monitor.update(Msg::Snapshot(vec![
            row("juice-shop", true),
            TargetRow::failed(
                &template("dvwa"),
                "docker-compose",
                "Container runtime unavailable",
            ),
        ]));

        assert_eq!(monitor.phase, Phase::Ready);
        assert_eq!(monitor.rows[1].status_label(), "Unknown");
        let toast = monitor.toast.as_ref().unwrap();
        assert_eq!(toast.kind, ToastKind::Error);
        assert!(toast.text.contains("Container runtime unavailable"));
        assert_eq!(
            monitor.last_error.as_deref(),
            Some("dvwa: Container runtime unavailable")
        );
    }

    #[test]
    fn test_clean_snapshot_leaves_no_error() {
        let mut monitor = ready(false);
        assert!(monitor.toast.is_none());
        assert!(monitor.last_error.is_none());
        assert!(monitor.rows.iter().all(|r| r.error.is_none()));
    }

    #[test]
    fn test_toast_expires_on_tick() {
        let mut monitor = ready(false);
        monitor.update(key(KeyCode::Char('a')));
        monitor.update(key(KeyCode::Char('a')));
        let expires_at = monitor.toast.as_ref().unwrap().expires_at;

        monitor.update(Msg::Tick(expires_at - Duration::from_millis(1)));
        assert!(monitor.toast.is_some());
        monitor.update(Msg::Tick(expires_at));
        assert!(monitor.toast.is_none());
    }

    #[test]
    fn test_action_on_empty_list_is_noop() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        monitor.init();
        monitor.update(Msg::Snapshot(Vec::new()));
        assert!(monitor.update(key(KeyCode::Char('a'))).is_empty());
        assert_eq!(monitor.phase, Phase::Ready);
    }

    #[test]
    fn test_row_labels() {
        let running = row("juice-shop", true);
        assert_eq!(running.status_label(), "Running (healthy)");
        assert_eq!(running.provider_short(), "dc");
        assert_eq!(running.containers, 1);
        assert_eq!(running.endpoints(), vec!["http://127.0.0.1:3000"]);

        assert_eq!(row("dvwa", false).status_label(), "Stopped");

        let failed = TargetRow::failed(&template("dvwa"), "compose", "timeout");
        assert_eq!(failed.status_label(), "Unknown");
        assert_eq!(failed.provider_short(), "compose");
        assert_eq!(failed.health, Health::Unknown);
    }
}
