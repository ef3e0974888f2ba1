mod logo;

pub use logo::{load_logo, logo_path};

use eframe::egui::{self, FontData, FontDefinitions, FontFamily, IconData};
use crate::config::{self, AppSettings, Mode, Profile, ProfileBook, ProfileStore};
use crate::error::{Field, ProfileError, StoreError, ValidationError};
use crate::network::{AdapterSnapshot, Netsh};
use crate::watcher::StoreWatcher;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{info, warn};

/// 后台读取的网卡状态
#[derive(Clone, Default)]
struct AdapterState {
    adapter: String,
    snapshot: Option<AdapterSnapshot>,
    is_loading: bool,
}

/// 编辑中的配置（文本框内容）
#[derive(Clone, Default)]
struct ProfileEditor {
    /// 正在修改的原配置名；None 表示新建
    original: Option<String>,
    name: String,
    adapter: String,
    mode: Mode,
    address: String,
    subnet_mask: String,
    gateway: String,
    dns: String,
    error: Option<ValidationError>,
    book_error: Option<String>,
}

impl ProfileEditor {
    fn blank(adapter: &str) -> Self {
        Self {
            adapter: adapter.to_string(),
            mode: Mode::Static,
            ..Self::default()
        }
    }

    fn from_profile(profile: &Profile) -> Self {
        Self {
            original: Some(profile.name.clone()),
            name: profile.name.clone(),
            adapter: profile.adapter.clone(),
            mode: profile.mode,
            address: profile.address.clone().unwrap_or_default(),
            subnet_mask: profile.subnet_mask.clone().unwrap_or_default(),
            gateway: profile.gateway.clone().unwrap_or_default(),
            dns: profile.dns.clone().unwrap_or_default(),
            error: None,
            book_error: None,
        }
    }

    /// 用网卡当前配置填充地址字段
    fn fill_from(&mut self, snapshot: &AdapterSnapshot) {
        let captured = snapshot.to_profile(&self.name, &self.adapter);
        self.mode = captured.mode;
        self.address = captured.address.unwrap_or_default();
        self.subnet_mask = captured.subnet_mask.unwrap_or_default();
        self.gateway = captured.gateway.unwrap_or_default();
        self.dns = captured.dns.unwrap_or_default();
    }

    fn to_profile(&self) -> Profile {
        let field = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        let is_static = self.mode == Mode::Static;
        Profile {
            name: self.name.trim().to_string(),
            adapter: self.adapter.trim().to_string(),
            mode: self.mode,
            address: field(&self.address).filter(|_| is_static),
            subnet_mask: field(&self.subnet_mask).filter(|_| is_static),
            gateway: field(&self.gateway).filter(|_| is_static),
            dns: field(&self.dns).filter(|_| is_static),
        }
    }

    fn error_for(&self, field: Field) -> Option<&ValidationError> {
        self.error.as_ref().filter(|e| e.field() == field)
    }
}

pub struct IpRangeChangerApp {
    settings: AppSettings,
    store: ProfileStore,
    book: ProfileBook,
    netsh: Netsh,
    adapters: Vec<String>,
    selected_adapter_idx: usize,
    logo: Option<(egui::TextureHandle, egui::Vec2)>,

    // 编辑状态
    editor: Option<ProfileEditor>,
    status_message: String,
    error_dialog: Option<String>,
    pending_delete: Option<String>,

    // 后台刷新状态
    bg_state: Arc<Mutex<AdapterState>>,
    is_refreshing: bool,
    current_snapshot: Option<AdapterSnapshot>,

    // 配置文件监视
    reload_rx: Receiver<()>,
    _watcher: Option<StoreWatcher>,
}

impl IpRangeChangerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, logo: Option<IconData>) -> Self {
        Self::setup_fonts(&cc.egui_ctx);
        let logo = logo.map(|icon| (logo::to_texture(&cc.egui_ctx, &icon), logo::banner_size(&icon)));

        let settings = AppSettings::load();
        let store = ProfileStore::new(settings.profiles_path());
        let netsh = Netsh::system();

        let mut error_dialog = None;
        let book = match store.load() {
            Ok(profiles) => ProfileBook::from_profiles(profiles),
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!("{}", e);
                error_dialog = Some(format!("{}\n\n配置文件已损坏，将以空列表启动 / Starting fresh.", e));
                ProfileBook::default()
            }
            Err(e) => {
                warn!("{}", e);
                error_dialog = Some(e.to_string());
                ProfileBook::default()
            }
        };

        let adapters = netsh.list_adapters();
        let selected_adapter_idx = settings
            .last_adapter
            .as_ref()
            .and_then(|last| adapters.iter().position(|a| a == last))
            .unwrap_or(0);

        let (tx, reload_rx) = mpsc::channel();
        let ctx = cc.egui_ctx.clone();
        let watcher = StoreWatcher::new(store.path(), move || {
            let _ = tx.send(());
            ctx.request_repaint();
        })
        .map_err(|e| warn!("Profile file watcher unavailable: {}", e))
        .ok();

        info!(
            "Loaded {} profiles, {} adapters",
            book.len(),
            adapters.len()
        );

        let mut app = Self {
            settings,
            store,
            book,
            netsh,
            adapters,
            selected_adapter_idx,
            logo,
            editor: None,
            status_message: String::new(),
            error_dialog,
            pending_delete: None,
            bg_state: Arc::new(Mutex::new(AdapterState::default())),
            is_refreshing: false,
            current_snapshot: None,
            reload_rx,
            _watcher: watcher,
        };
        app.refresh_in_background();
        app
    }

    fn setup_fonts(ctx: &egui::Context) {
        let mut fonts = FontDefinitions::default();

        // 尝试加载系统中文字体
        let font_paths = [
            "C:\\Windows\\Fonts\\msyh.ttc",
            "C:\\Windows\\Fonts\\simhei.ttf",
            "C:\\Windows\\Fonts\\simsun.ttc",
        ];

        for path in font_paths {
            if let Ok(font_data) = std::fs::read(path) {
                fonts.font_data.insert(
                    "chinese".to_owned(),
                    FontData::from_owned(font_data).into(),
                );
                for family in [FontFamily::Proportional, FontFamily::Monospace] {
                    fonts
                        .families
                        .entry(family)
                        .or_default()
                        .push("chinese".to_owned());
                }
                ctx.set_fonts(fonts);
                return;
            }
        }
    }

    fn selected_adapter(&self) -> &str {
        self.adapters
            .get(self.selected_adapter_idx)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// 在后台线程读取当前网卡配置
    fn refresh_in_background(&mut self) {
        if self.is_refreshing {
            return;
        }
        self.is_refreshing = true;

        let adapter = self.selected_adapter().to_string();
        let bg_state = Arc::clone(&self.bg_state);
        let netsh = self.netsh.clone();

        if let Ok(mut state) = bg_state.lock() {
            state.is_loading = true;
        }

        thread::spawn(move || {
            let snapshot = netsh.current_config(&adapter);
            if let Ok(mut state) = bg_state.lock() {
                state.adapter = adapter;
                state.snapshot = snapshot;
                state.is_loading = false;
            }
        });
    }

    /// 取回后台结果
    fn check_bg_state(&mut self) {
        let Ok(state) = self.bg_state.lock() else {
            return;
        };
        if state.is_loading || !self.is_refreshing {
            return;
        }
        let stale = state.adapter != self.selected_adapter();
        self.current_snapshot = if stale { None } else { state.snapshot.clone() };
        self.is_refreshing = false;
        drop(state);

        // 刷新期间切换了网卡，再取一次
        if stale {
            self.refresh_in_background();
        }
    }

    /// 配置文件被外部修改时重新加载
    fn check_reload(&mut self) {
        let mut changed = false;
        while self.reload_rx.try_recv().is_ok() {
            changed = true;
        }
        if !changed {
            return;
        }

        match self.store.load() {
            Ok(profiles) => {
                let book = ProfileBook::from_profiles(profiles);
                if book != self.book {
                    info!("Profile file changed on disk, reloading");
                    self.book = book;
                    self.status_message = "已从磁盘重新加载配置 / Reloaded from disk".to_string();
                }
            }
            // 写入过程中可能读到半个文件，下一次事件再试
            Err(e) => warn!("Reload skipped: {}", e),
        }
    }

    /// 保存修改后的列表；写入失败时保留原列表
    fn commit(&mut self, book: ProfileBook) -> bool {
        match self.store.save(book.as_slice()) {
            Ok(()) => {
                self.book = book;
                true
            }
            Err(e) => {
                warn!("{}", e);
                self.error_dialog = Some(e.to_string());
                false
            }
        }
    }

    fn apply_profile(&mut self, profile: &Profile) {
        let adapter = if profile.adapter.is_empty() {
            self.selected_adapter().to_string()
        } else {
            profile.adapter.clone()
        };

        match self.netsh.apply(profile, &adapter) {
            Ok(()) => {
                self.status_message = format!("✅ 已应用配置 / Applied: {} -> {}", profile.name, adapter);
                if let Some(idx) = self.adapters.iter().position(|a| *a == adapter) {
                    self.select_adapter(idx);
                }
                self.refresh_in_background();
            }
            Err(e) => {
                self.status_message = format!("❌ 应用失败 / Apply failed: {}", profile.name);
                self.error_dialog = Some(e.to_string());
            }
        }
    }

    fn select_adapter(&mut self, idx: usize) {
        self.selected_adapter_idx = idx;
        self.settings.last_adapter = Some(self.selected_adapter().to_string());
        if let Err(e) = self.settings.save() {
            warn!("Saving settings failed: {}", e);
        }
    }

    fn add_dhcp_profile(&mut self) {
        let requested = self.editor.as_ref().map(|e| e.name.as_str()).unwrap_or_default();
        let profile = Profile::dhcp(config::dhcp_name(requested), "");
        let name = profile.name.clone();

        let mut book = self.book.clone();
        match book.add(profile) {
            Ok(()) => {
                if self.commit(book) {
                    self.status_message = format!("已添加 DHCP 配置 / Added: {}", name);
                }
            }
            Err(e) => self.status_message = format!("⚠️ {}", e),
        }
    }

    fn delete_profile(&mut self, name: &str) {
        let mut book = self.book.clone();
        if let Err(e) = book.remove(name) {
            self.status_message = format!("⚠️ {}", e);
            return;
        }
        if self.commit(book) {
            if self.editor.as_ref().and_then(|e| e.original.as_deref()) == Some(name) {
                self.editor = None;
            }
            self.status_message = format!("已删除 / Deleted: {}", name);
        }
    }

    fn save_editor(&mut self) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        editor.error = None;
        editor.book_error = None;

        let profile = editor.to_profile();
        let name = profile.name.clone();
        let mut book = self.book.clone();
        let result = match editor.original.as_deref() {
            Some(original) => book.update(original, profile),
            None => book.add(profile),
        };

        match result {
            Ok(()) => {
                if self.commit(book) {
                    self.editor = None;
                    self.status_message = format!("配置已保存 / Saved: {}", name);
                }
            }
            Err(ProfileError::Invalid(e)) => editor.error = Some(e),
            Err(e) => editor.book_error = Some(e.to_string()),
        }
    }
}

impl eframe::App for IpRangeChangerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_reload();
        self.check_bg_state();
        if self.is_refreshing {
            ctx.request_repaint_after(std::time::Duration::from_millis(200));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some((texture, size)) = &self.logo {
                ui.vertical_centered(|ui| {
                    ui.image((texture.id(), *size));
                });
            }
            ui.heading("🌐 IP 配置切换器 / IP Range Changer");
            ui.add_space(10.0);

            self.render_adapter_panel(ui);
            ui.add_space(10.0);
            self.render_profile_list(ui);
            ui.add_space(10.0);
            self.render_edit_panel(ui);

            // 状态消息
            if !self.status_message.is_empty() {
                ui.add_space(10.0);
                ui.colored_label(egui::Color32::from_rgb(100, 200, 100), &self.status_message);
            }
        });

        self.render_delete_dialog(ctx);
        self.render_error_dialog(ctx);
    }
}

impl IpRangeChangerApp {
    fn render_adapter_panel(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            let mut adapter_changed: Option<usize> = None;
            let mut reload_adapters = false;

            ui.horizontal(|ui| {
                ui.label("网卡 / Adapter:");
                egui::ComboBox::from_id_salt("adapter_select")
                    .selected_text(self.selected_adapter())
                    .show_ui(ui, |ui| {
                        for (i, adapter) in self.adapters.iter().enumerate() {
                            if ui.selectable_label(self.selected_adapter_idx == i, adapter).clicked() {
                                adapter_changed = Some(i);
                            }
                        }
                    });
                if ui.button("🔄 刷新").clicked() {
                    reload_adapters = true;
                }
                if self.is_refreshing {
                    ui.spinner();
                }
            });

            if reload_adapters {
                let current = self.selected_adapter().to_string();
                self.adapters = self.netsh.list_adapters();
                self.selected_adapter_idx = self.adapters.iter().position(|a| *a == current).unwrap_or(0);
                self.refresh_in_background();
            }
            if let Some(idx) = adapter_changed {
                self.select_adapter(idx);
                self.refresh_in_background();
            }

            ui.separator();

            match &self.current_snapshot {
                Some(snapshot) => {
                    ui.horizontal(|ui| {
                        ui.label("模式 / Mode:");
                        ui.strong(if snapshot.dhcp { "DHCP" } else { "静态 / Static" });
                    });
                    ui.horizontal(|ui| {
                        ui.label("IP:");
                        ui.strong(snapshot.address.as_deref().unwrap_or("N/A"));
                    });
                    ui.horizontal(|ui| {
                        ui.label("子网掩码 / Subnet:");
                        ui.strong(snapshot.subnet_mask.as_deref().unwrap_or("N/A"));
                    });
                    ui.horizontal(|ui| {
                        ui.label("网关 / Gateway:");
                        ui.strong(snapshot.gateway.as_deref().unwrap_or("N/A"));
                    });
                    ui.horizontal(|ui| {
                        ui.label("DNS:");
                        if snapshot.dns_servers.is_empty() {
                            ui.strong("N/A");
                        } else {
                            ui.strong(snapshot.dns_servers.join(", "));
                        }
                    });
                }
                None if self.is_refreshing => {
                    ui.label("加载中... / Loading...");
                }
                None => {
                    ui.label("无法读取当前配置 / Current configuration unavailable");
                }
            }
        });
    }

    fn render_profile_list(&mut self, ui: &mut egui::Ui) {
        let mut to_edit: Option<Profile> = None;
        let mut to_apply: Option<Profile> = None;
        let mut to_delete: Option<String> = None;
        let mut add_new = false;
        let mut add_dhcp = false;

        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.label("已保存的配置 / Saved Profiles");
                if ui.button("➕ 添加 / Add").clicked() {
                    add_new = true;
                }
                if ui.button("➕ DHCP").clicked() {
                    add_dhcp = true;
                }
            });

            ui.separator();

            egui::ScrollArea::vertical()
                .id_salt("profile_list")
                .max_height(220.0)
                .show(ui, |ui| {
                    for profile in self.book.iter() {
                        ui.horizontal(|ui| {
                            ui.strong(&profile.name);
                            ui.label(profile.summary());
                            if !profile.adapter.is_empty() {
                                ui.label(format!("→ {}", profile.adapter));
                            }

                            if ui.button("编辑").clicked() {
                                to_edit = Some(profile.clone());
                            }
                            if ui.button("应用").clicked() {
                                to_apply = Some(profile.clone());
                            }
                            if ui.button("🗑").clicked() {
                                to_delete = Some(profile.name.clone());
                            }
                        });
                    }
                });

            if self.book.is_empty() {
                ui.label("暂无保存的配置，点击「添加」创建新配置");
            }
        });

        if add_new {
            self.editor = Some(ProfileEditor::blank(""));
        }
        if add_dhcp {
            self.add_dhcp_profile();
        }
        if let Some(profile) = to_edit {
            self.editor = Some(ProfileEditor::from_profile(&profile));
        }
        if let Some(profile) = to_apply {
            self.apply_profile(&profile);
        }
        if to_delete.is_some() {
            self.pending_delete = to_delete;
        }
    }

    fn render_edit_panel(&mut self, ui: &mut egui::Ui) {
        let mut should_save = false;
        let mut should_cancel = false;
        let mut should_capture = false;

        let adapters = self.adapters.clone();
        let can_capture = self.current_snapshot.is_some();

        let Some(editor) = self.editor.as_mut() else {
            return;
        };

        ui.group(|ui| {
            ui.label(if editor.original.is_some() {
                "📝 编辑配置 / Edit Profile"
            } else {
                "📝 新建配置 / New Profile"
            });
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("配置名称 / Name:");
                ui.add(egui::TextEdit::singleline(&mut editor.name).hint_text("Office"));
            });
            error_line(ui, editor.error_for(Field::Name));
            if let Some(ref msg) = editor.book_error {
                ui.colored_label(egui::Color32::RED, msg);
            }

            ui.horizontal(|ui| {
                ui.label("网卡 / Adapter:");
                let selected = if editor.adapter.is_empty() {
                    "(使用当前选择 / selected)".to_string()
                } else {
                    editor.adapter.clone()
                };
                egui::ComboBox::from_id_salt("editor_adapter")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut editor.adapter, String::new(), "(使用当前选择 / selected)");
                        for adapter in &adapters {
                            ui.selectable_value(&mut editor.adapter, adapter.clone(), adapter);
                        }
                    });
            });

            ui.horizontal(|ui| {
                ui.label("模式 / Mode:");
                ui.radio_value(&mut editor.mode, Mode::Static, "静态 / Static");
                ui.radio_value(&mut editor.mode, Mode::Dhcp, "DHCP");
            });

            if editor.mode == Mode::Static {
                let error = editor.error.clone();
                let rows = [
                    ("IP 地址 / IP:", &mut editor.address, "192.168.1.50", Field::Address),
                    ("子网掩码 / Subnet:", &mut editor.subnet_mask, "255.255.255.0", Field::SubnetMask),
                    ("网关 / Gateway:", &mut editor.gateway, "192.168.1.1", Field::Gateway),
                    ("DNS:", &mut editor.dns, "8.8.8.8", Field::Dns),
                ];
                for (label, value, hint, field) in rows {
                    ui.horizontal(|ui| {
                        ui.label(label);
                        ui.add(egui::TextEdit::singleline(value).hint_text(hint));
                    });
                    error_line(ui, error.as_ref().filter(|e| e.field() == field));
                }
            }

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                if ui.button("💾 保存 / Save").clicked() {
                    should_save = true;
                }
                if ui
                    .add_enabled(can_capture, egui::Button::new("从当前获取 / Capture current"))
                    .clicked()
                {
                    should_capture = true;
                }
                if ui.button("取消 / Cancel").clicked() {
                    should_cancel = true;
                }
            });
        });

        // 处理延迟的操作
        if should_capture {
            if let (Some(editor), Some(snapshot)) = (self.editor.as_mut(), self.current_snapshot.as_ref()) {
                editor.fill_from(snapshot);
                editor.error = None;
            }
        }

        if should_save {
            self.save_editor();
        }

        if should_cancel {
            self.editor = None;
        }
    }

    fn render_delete_dialog(&mut self, ctx: &egui::Context) {
        let Some(name) = self.pending_delete.clone() else {
            return;
        };

        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new("删除配置 / Delete Profile")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("确定删除「{}」？ / Delete '{}'?", name, name));
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    if ui.button("删除 / Delete").clicked() {
                        confirmed = true;
                    }
                    if ui.button("取消 / Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });

        if confirmed {
            self.pending_delete = None;
            self.delete_profile(&name);
        } else if cancelled {
            self.pending_delete = None;
        }
    }

    fn render_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(message) = self.error_dialog.clone() else {
            return;
        };

        egui::Window::new("错误 / Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(egui::Color32::RED, &message);
                ui.add_space(10.0);
                if ui.button("确定 / OK").clicked() {
                    self.error_dialog = None;
                }
            });
    }
}

fn error_line(ui: &mut egui::Ui, error: Option<&ValidationError>) {
    if let Some(e) = error {
        ui.colored_label(egui::Color32::RED, format!("⚠️ {}", e));
    }
}
