// SPDX-License-Identifier: MPL-2.0

use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{gio, glib};
use libadwaita as adw;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::sync::mpsc::{self, TryRecvError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheDb, ProfileCache};
use crate::config::{APP_ID, BackendConfig};
use crate::runtime;
use crate::state::{AppSettings, Dashboard, FriendList, Selection, SessionManager};
use crate::supabase::{
    AuthClient, ClientError, HttpTransport, Message, ParleyClient, Profile, RealtimeClient,
    Session, SignUpOutcome,
};
use crate::ui::{
    AdminPanel, LoginDialog, NameDialog, Page, ParleyWindow, ServerSettingsDialog,
    UserSettingsDialog,
};

/// How often the main loop checks for finished background work
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Refresh the access token this long before it expires
const REFRESH_MARGIN_SECS: i64 = 120;

type Client = ParleyClient<HttpTransport>;

/// Everything that talks to the hosted backend
#[derive(Clone)]
struct Backend {
    client: Arc<Client>,
    auth: Arc<AuthClient>,
    realtime: Arc<RealtimeClient>,
}

impl Backend {
    fn connect(settings: &AppSettings) -> Result<Self, String> {
        let config = BackendConfig::resolve(settings).map_err(|e| e.to_string())?;
        let realtime = RealtimeClient::new(&config).map_err(|e| e.to_string())?;
        Ok(Self {
            auth: Arc::new(AuthClient::new(config.clone())),
            client: Arc::new(ParleyClient::new(HttpTransport::new(config))),
            realtime: Arc::new(realtime),
        })
    }
}

mod imp {
    use super::*;
    use libadwaita::subclass::prelude::*;

    #[derive(Default)]
    pub struct ParleyApplication {
        pub window: RefCell<Option<ParleyWindow>>,
        pub settings: RefCell<AppSettings>,
        pub backend: RefCell<Option<Backend>>,
        pub session: RefCell<Option<Session>>,
        pub profile: RefCell<Option<Profile>>,
        pub cache: RefCell<Option<CacheDb>>,
        pub dashboard: RefCell<Dashboard>,
        pub friends: RefCell<FriendList>,
        /// Consumer of the open channel's insert stream
        pub realtime_task: RefCell<Option<JoinHandle<()>>>,
        /// Hands refreshed access tokens to the open channel's subscription
        pub realtime_token: RefCell<Option<tokio::sync::mpsc::UnboundedSender<String>>>,
        pub refresh_source: RefCell<Option<glib::SourceId>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ParleyApplication {
        const NAME: &'static str = "ParleyApplication";
        type Type = super::ParleyApplication;
        type ParentType = adw::Application;
    }

    impl ObjectImpl for ParleyApplication {
        fn constructed(&self) {
            self.parent_constructed();
            self.settings.replace(AppSettings::load());
        }
    }

    impl ApplicationImpl for ParleyApplication {
        fn startup(&self) {
            self.parent_startup();

            let display = gtk4::gdk::Display::default().expect("Could not get default display");

            let css_provider = gtk4::CssProvider::new();
            css_provider.load_from_data(include_str!("ui/style.css"));

            gtk4::style_context_add_provider_for_display(
                &display,
                &css_provider,
                gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
            );
        }

        fn activate(&self) {
            let app = self.obj();

            if let Some(window) = self.window.borrow().as_ref() {
                window.present();
                return;
            }

            let window = ParleyWindow::new(app.upcast_ref::<adw::Application>());
            self.window.replace(Some(window.clone()));
            app.connect_window(&window);
            window.present();

            let backend = Backend::connect(&self.settings.borrow());
            match backend {
                Ok(backend) => {
                    self.backend.replace(Some(backend));
                    window.show_page(Page::Home);
                    app.try_restore_session();
                }
                Err(reason) => {
                    warn!("Backend not configured: {}", reason);
                    let path = AppSettings::settings_path();
                    let path = path.as_ref().map(|p| p.display().to_string());
                    window.show_unconfigured(&reason, path.as_deref());
                }
            }
        }
    }

    impl GtkApplicationImpl for ParleyApplication {}
    impl AdwApplicationImpl for ParleyApplication {}
}

glib::wrapper! {
    pub struct ParleyApplication(ObjectSubclass<imp::ParleyApplication>)
        @extends adw::Application, gtk4::Application, gio::Application,
        @implements gio::ActionGroup, gio::ActionMap;
}

impl ParleyApplication {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("application-id", APP_ID)
            .property("flags", gio::ApplicationFlags::FLAGS_NONE)
            .build()
    }

    fn window(&self) -> Option<ParleyWindow> {
        self.imp().window.borrow().clone()
    }

    fn backend(&self) -> Option<Backend> {
        self.imp().backend.borrow().clone()
    }

    fn user_id(&self) -> Option<String> {
        self.imp()
            .session
            .borrow()
            .as_ref()
            .map(|s| s.user_id.clone())
    }

    fn toast(&self, message: &str) {
        if let Some(window) = self.window() {
            window.show_toast(message);
        }
    }

    /// Run `future` on the shared runtime and hand its output to `on_done`
    /// on the main loop.
    fn spawn_then<T, Fut, F>(&self, future: Fut, on_done: F)
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        F: FnOnce(&Self, T) + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>();
        runtime::spawn(async move {
            let _ = tx.send(future.await);
        });

        let app = self.clone();
        let mut on_done = Some(on_done);
        glib::timeout_add_local(POLL_INTERVAL, move || match rx.try_recv() {
            Ok(result) => {
                if let Some(on_done) = on_done.take() {
                    on_done(&app, result);
                }
                glib::ControlFlow::Break
            }
            Err(TryRecvError::Empty) => glib::ControlFlow::Continue,
            Err(TryRecvError::Disconnected) => {
                error!("Background task ended without a result");
                glib::ControlFlow::Break
            }
        });
    }

    fn connect_window(&self, window: &ParleyWindow) {
        let app = self.clone();
        window.set_refresh_callback(move || app.refresh());

        if let Some(bar) = window.server_bar() {
            let app = self.clone();
            bar.connect_server_selected(move |id| app.select_server(id));

            let app = self.clone();
            bar.connect_friends_clicked(move || app.open_friends());

            let app = self.clone();
            bar.connect_add_server_clicked(move || app.open_create_server_dialog());

            let app = self.clone();
            bar.connect_admin_clicked(move || app.open_admin_panel());

            let app = self.clone();
            bar.connect_account_clicked(move || app.open_user_settings());
        }

        if let Some(sidebar) = window.channel_sidebar() {
            let app = self.clone();
            sidebar.connect_channel_selected(move |id| app.select_channel(&id));

            let app = self.clone();
            sidebar.connect_add_channel_clicked(move || app.open_create_channel_dialog());

            let app = self.clone();
            sidebar.connect_settings_clicked(move || app.open_server_settings());
        }

        if let Some(chat) = window.chat_view() {
            let app = self.clone();
            chat.connect_send(move |content| app.send_message(content));
        }

        if let Some(panel) = window.friends_panel() {
            let app = self.clone();
            panel.connect_search(move |term| app.search_profiles(term));

            let app = self.clone();
            panel.connect_request(move |friend_id| app.send_friend_request(friend_id));

            let app = self.clone();
            panel.connect_accept(move |id| app.accept_friend_request(id));

            let app = self.clone();
            panel.connect_remove(move |id| app.remove_friendship(id));

            let app = self.clone();
            panel.connect_message(move |profile| {
                info!("Direct message to @{} requested", profile.username);
                app.toast("Direct messages aren't available yet");
            });
        }
    }

    // Session

    fn try_restore_session(&self) {
        let Some(backend) = self.backend() else {
            return;
        };

        self.spawn_then(
            async move {
                let stored = SessionManager::load().await.map_err(|e| e.to_string())?;
                backend
                    .auth
                    .refresh(&stored.refresh_token)
                    .await
                    .map_err(|e| e.to_string())
            },
            |app, result| match result {
                Ok(session) => {
                    info!("Restored session for {}", session.user_id);
                    app.start_session(session);
                }
                Err(e) => {
                    debug!("No session to restore: {}", e);
                    app.show_login_dialog();
                }
            },
        );
    }

    fn show_login_dialog(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let dialog = LoginDialog::new(&window);
        if let Some(email) = self.imp().settings.borrow().last_email.as_deref() {
            dialog.set_email(email);
        }

        let app = self.clone();
        dialog.connect_sign_in(move |dlg| {
            let Some(backend) = app.backend() else {
                return;
            };
            let email = dlg.email();
            let password = dlg.password();
            if email.is_empty() || password.is_empty() {
                return;
            }

            dlg.set_loading(true);
            dlg.hide_error();

            let dialog_weak = dlg.downgrade();
            let remembered = email.clone();
            app.spawn_then(
                async move { backend.auth.sign_in(&email, &password).await },
                move |app, result| match result {
                    Ok(session) => {
                        info!("Signed in as {}", session.user_id);
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.close();
                        }
                        app.remember_email(remembered);
                        app.start_session(session);
                    }
                    Err(e) => {
                        warn!("Sign in failed: {}", e);
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.set_loading(false);
                            dialog.show_error(&format!("Sign in failed: {}", e));
                        }
                    }
                },
            );
        });

        let app = self.clone();
        dialog.connect_sign_up(move |dlg| {
            let Some(backend) = app.backend() else {
                return;
            };
            let email = dlg.email();
            let password = dlg.password();
            let username = dlg.username();

            dlg.set_loading(true);
            dlg.hide_error();

            let dialog_weak = dlg.downgrade();
            let remembered = email.clone();
            app.spawn_then(
                async move { backend.auth.sign_up(&email, &password, &username).await },
                move |app, result| {
                    let Some(dialog) = dialog_weak.upgrade() else {
                        return;
                    };
                    match result {
                        Ok(SignUpOutcome::SignedIn(session)) => {
                            info!("Account created for {}", session.user_id);
                            dialog.close();
                            app.remember_email(remembered);
                            app.start_session(session);
                        }
                        Ok(SignUpOutcome::ConfirmationRequired) => {
                            info!("Account created, waiting for e-mail confirmation");
                            app.remember_email(remembered);
                            dialog.set_loading(false);
                            dialog.switch_to_sign_in();
                            dialog.show_info(
                                "Check your inbox to confirm your account, then sign in.",
                            );
                        }
                        Err(e) => {
                            warn!("Sign up failed: {}", e);
                            dialog.set_loading(false);
                            dialog.show_error(&format!("Sign up failed: {}", e));
                        }
                    }
                },
            );
        });

        dialog.present();
    }

    fn remember_email(&self, email: String) {
        let mut settings = self.imp().settings.borrow_mut();
        settings.last_email = Some(email);
        if let Err(e) = settings.save() {
            warn!("Failed to save settings: {}", e);
        }
    }

    fn start_session(&self, session: Session) {
        let Some(backend) = self.backend() else {
            return;
        };
        let imp = self.imp();

        backend
            .client
            .transport()
            .set_access_token(Some(session.access_token.clone()));

        match CacheDb::open(&session.user_id) {
            Ok(db) => {
                match db.cleanup_stale() {
                    Ok(0) => {}
                    Ok(n) => debug!("Pruned {} stale cached profiles", n),
                    Err(e) => warn!("Failed to prune profile cache: {}", e),
                }
                // Show the last known identity until the fresh profile arrives
                if let Ok(profile) = ProfileCache::new(&db).get(&session.user_id) {
                    self.show_own_profile(profile);
                }
                imp.cache.replace(Some(db));
            }
            Err(e) => warn!("Profile cache unavailable: {}", e),
        }

        let stored = session.clone();
        runtime::spawn(async move {
            if let Err(e) = SessionManager::store(&stored).await {
                warn!("Failed to persist session: {}", e);
            }
        });

        self.schedule_session_refresh(&session);
        imp.session.replace(Some(session));
        imp.dashboard.borrow_mut().clear();

        if let Some(window) = self.window() {
            window.show_page(Page::Home);
        }

        self.load_own_profile();
        self.load_servers();
        self.load_friends();
    }

    fn schedule_session_refresh(&self, session: &Session) {
        let now = chrono::Utc::now().timestamp();
        let delay = if session.is_expired(now) {
            1
        } else {
            (session.expires_at - now - REFRESH_MARGIN_SECS).clamp(1, u32::MAX as i64)
        };
        debug!("Refreshing the session in {}s", delay);

        let app = self.clone();
        let source = glib::timeout_add_seconds_local_once(delay as u32, move || {
            app.imp().refresh_source.take();
            app.refresh_session();
        });
        if let Some(previous) = self.imp().refresh_source.replace(Some(source)) {
            previous.remove();
        }
    }

    fn refresh_session(&self) {
        let Some(backend) = self.backend() else {
            return;
        };
        let Some((user_id, refresh_token)) = self
            .imp()
            .session
            .borrow()
            .as_ref()
            .map(|s| (s.user_id.clone(), s.refresh_token.clone()))
        else {
            return;
        };

        let auth = backend.auth.clone();
        self.spawn_then(
            async move { auth.refresh(&refresh_token).await },
            move |app, result| {
                // Signed out (or switched user) while the refresh was in flight
                if !refresh_still_current(app.user_id().as_deref(), &user_id) {
                    debug!("Discarding refresh result for an ended session");
                    return;
                }
                app.finish_session_refresh(&backend, result);
            },
        );
    }

    fn finish_session_refresh(&self, backend: &Backend, result: Result<Session, ClientError>) {
        match result {
            Ok(session) => {
                debug!("Session refreshed");
                backend
                    .client
                    .transport()
                    .set_access_token(Some(session.access_token.clone()));
                if let Some(realtime) = self.imp().realtime_token.borrow().as_ref()
                    && realtime.send(session.access_token.clone()).is_err()
                {
                    debug!("Realtime consumer already gone");
                }
                let stored = session.clone();
                runtime::spawn(async move {
                    if let Err(e) = SessionManager::store(&stored).await {
                        warn!("Failed to persist session: {}", e);
                    }
                });
                self.schedule_session_refresh(&session);
                self.imp().session.replace(Some(session));
            }
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                self.toast("Your session expired. Please sign in again.");
                self.sign_out();
            }
        }
    }

    fn sign_out(&self) {
        let imp = self.imp();
        self.stop_realtime();
        if let Some(source) = imp.refresh_source.take() {
            source.remove();
        }

        let session = imp.session.take();
        if let Some(backend) = self.backend() {
            backend.client.transport().set_access_token(None);
            let auth = backend.auth.clone();
            runtime::spawn(async move {
                if let Some(session) = session
                    && let Err(e) = auth.sign_out(&session).await
                {
                    warn!("Failed to revoke session: {}", e);
                }
                if let Err(e) = SessionManager::clear().await {
                    warn!("Failed to clear stored session: {}", e);
                }
            });
        }

        imp.profile.take();
        imp.cache.take();
        imp.dashboard.borrow_mut().clear();
        imp.friends.replace(FriendList::default());
        info!("Signed out");

        if let Some(window) = self.window() {
            if let Some(bar) = window.server_bar() {
                bar.set_servers(&[], None);
                bar.set_user("", None);
                bar.set_admin_visible(false);
            }
            if let Some(chat) = window.chat_view() {
                chat.clear();
            }
            if let Some(panel) = window.friends_panel() {
                panel.set_friends(&FriendList::default());
                panel.reset_search();
            }
            window.show_page(Page::Home);
        }
        self.show_login_dialog();
    }

    // Profile

    fn load_own_profile(&self) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };

        self.spawn_then(
            async move { backend.client.profile(&user_id).await },
            |app, result| match result {
                Ok(profile) => app.set_own_profile(profile),
                Err(e) => error!("Failed to load own profile: {}", e),
            },
        );
    }

    fn set_own_profile(&self, profile: Profile) {
        if let Some(db) = self.imp().cache.borrow().as_ref()
            && let Err(e) = ProfileCache::new(db).store(&profile)
        {
            warn!("Failed to cache own profile: {}", e);
        }
        self.show_own_profile(profile);
    }

    fn show_own_profile(&self, profile: Profile) {
        if let Some(bar) = self.window().and_then(|w| w.server_bar()) {
            bar.set_user(profile.display_label(), profile.avatar_url.as_deref());
            bar.set_admin_visible(profile.is_owner);
        }
        self.imp().profile.replace(Some(profile));
    }

    // Navigation

    fn refresh(&self) {
        if self.imp().session.borrow().is_none() {
            return;
        }
        debug!("Refreshing");
        self.load_servers();
        self.load_friends();

        let channel_id = self
            .imp()
            .dashboard
            .borrow()
            .selected_channel_id()
            .map(str::to_string);
        if let Some(channel_id) = channel_id {
            self.load_history(channel_id, false);
        }
    }

    fn load_servers(&self) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };

        self.spawn_then(
            async move { backend.client.list_servers(&user_id).await },
            |app, result| match result {
                Ok(servers) => {
                    debug!("Loaded {} servers", servers.len());
                    let was_open = app.imp().dashboard.borrow().selected_server_id().is_some();
                    app.imp().dashboard.borrow_mut().set_servers(servers);
                    let still_open = app.imp().dashboard.borrow().selected_server_id().is_some();
                    if was_open && !still_open {
                        app.stop_realtime();
                    }
                    app.sync_navigation();
                }
                Err(e) => {
                    error!("Failed to load servers: {}", e);
                    app.toast(&format!("Couldn't load servers: {}", e));
                }
            },
        );
    }

    /// Bring the server bar and the main stack in line with the dashboard
    fn sync_navigation(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let dashboard = self.imp().dashboard.borrow();

        if let Some(bar) = window.server_bar() {
            bar.set_servers(dashboard.servers(), dashboard.selected_server_id());
        }
        let page = match dashboard.selection() {
            Selection::Home => Page::Home,
            Selection::Friends => Page::Friends,
            Selection::Server(_) => Page::Server,
        };
        window.show_page(page);
    }

    fn open_friends(&self) {
        if self.imp().dashboard.borrow_mut().select(Selection::Friends) {
            self.stop_realtime();
        }
        self.sync_navigation();
        self.load_friends();
    }

    fn select_server(&self, server_id: String) {
        let changed = self
            .imp()
            .dashboard
            .borrow_mut()
            .select(Selection::Server(server_id.clone()));
        if !changed {
            self.sync_navigation();
            return;
        }
        self.stop_realtime();

        let Some(window) = self.window() else {
            return;
        };
        let server_name = self
            .imp()
            .dashboard
            .borrow()
            .selected_server()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        if let Some(sidebar) = window.channel_sidebar() {
            sidebar.set_server_name(&server_name);
            sidebar.set_can_manage(false);
            sidebar.set_channels(&[], None);
        }
        if let Some(chat) = window.chat_view() {
            chat.clear();
            chat.set_can_send(false);
        }
        self.sync_navigation();
        self.load_channels(server_id);
    }

    fn load_channels(&self, server_id: String) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };

        let requested = server_id.clone();
        self.spawn_then(
            async move {
                let client = &backend.client;
                tokio::try_join!(
                    client.list_channels(&server_id),
                    client.membership(&server_id, &user_id)
                )
            },
            move |app, result| {
                if app.imp().dashboard.borrow().selected_server_id() != Some(requested.as_str()) {
                    debug!("Ignoring channels of a server that is no longer open");
                    return;
                }
                match result {
                    Ok((channels, membership)) => {
                        let to_open = {
                            let mut dashboard = app.imp().dashboard.borrow_mut();
                            dashboard.set_membership(membership);
                            dashboard.set_channels(channels)
                        };
                        app.sync_channels();
                        if let Some(channel_id) = to_open {
                            app.open_channel(channel_id);
                        }
                    }
                    Err(e) => {
                        error!("Failed to load channels: {}", e);
                        app.toast(&format!("Couldn't load channels: {}", e));
                    }
                }
            },
        );
    }

    fn sync_channels(&self) {
        let Some(sidebar) = self.window().and_then(|w| w.channel_sidebar()) else {
            return;
        };
        let dashboard = self.imp().dashboard.borrow();
        sidebar.set_can_manage(dashboard.can_manage_channels());
        sidebar.set_channels(dashboard.channels(), dashboard.selected_channel_id());
    }

    fn select_channel(&self, channel_id: &str) {
        if self.imp().dashboard.borrow_mut().select_channel(channel_id) {
            self.open_channel(channel_id.to_string());
        }
    }

    fn open_channel(&self, channel_id: String) {
        self.stop_realtime();

        let Some(window) = self.window() else {
            return;
        };
        let name = self
            .imp()
            .dashboard
            .borrow()
            .selected_channel()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        if let Some(sidebar) = window.channel_sidebar() {
            sidebar.select_channel(Some(&channel_id));
        }
        if let Some(chat) = window.chat_view() {
            chat.clear();
            chat.set_channel_name(&name);
            chat.set_can_send(true);
        }

        self.load_history(channel_id, true);
    }

    /// Fetch the recent page of a channel, then follow its inserts if asked to
    fn load_history(&self, channel_id: String, subscribe: bool) {
        let Some(backend) = self.backend() else {
            return;
        };

        let requested = channel_id.clone();
        self.spawn_then(
            async move { backend.client.recent_messages(&channel_id).await },
            move |app, result| match result {
                Ok(messages) => {
                    if let Some(db) = app.imp().cache.borrow().as_ref()
                        && let Err(e) = ProfileCache::new(db)
                            .store_all(messages.iter().filter_map(|m| m.profile.as_ref()))
                    {
                        warn!("Failed to cache sender profiles: {}", e);
                    }

                    let applied = app
                        .imp()
                        .dashboard
                        .borrow_mut()
                        .set_messages(&requested, messages);
                    if !applied {
                        debug!("Dropping history of a channel that is no longer open");
                        return;
                    }
                    if let Some(chat) = app.window().and_then(|w| w.chat_view()) {
                        chat.set_messages(app.imp().dashboard.borrow().messages());
                    }
                    if subscribe {
                        app.start_realtime(requested);
                    }
                }
                Err(e) => {
                    error!("Failed to load messages: {}", e);
                    app.toast(&format!("Couldn't load messages: {}", e));
                }
            },
        );
    }

    // Realtime

    fn start_realtime(&self, channel_id: String) {
        let Some(backend) = self.backend() else {
            return;
        };
        let Some(token) = self
            .imp()
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
        else {
            return;
        };
        let cache = self.imp().cache.borrow().clone();

        let (tx, rx) = mpsc::channel::<Message>();
        let (token_tx, mut token_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let task = runtime::spawn(async move {
            let topic = format!("channel-{channel_id}");
            let filter = format!("channel_id=eq.{channel_id}");
            let mut subscription = match backend
                .realtime
                .subscribe_inserts(&token, &topic, "messages", &filter)
                .await
            {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!("Failed to subscribe to {}: {}", topic, e);
                    return;
                }
            };
            debug!("Following {}", subscription.topic());

            loop {
                tokio::select! {
                    record = subscription.next_insert() => {
                        let Some(record) = record else {
                            break;
                        };
                        match backend.client.resolve_insert(cache.as_ref(), record).await {
                            Ok(message) => {
                                if tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed insert: {}", e),
                        }
                    }
                    Some(token) = token_rx.recv() => subscription.set_access_token(&token),
                }
            }
            warn!("Realtime stream for {} ended", subscription.topic());
            subscription.unsubscribe();
        });

        if let Some(previous) = self.imp().realtime_task.replace(Some(task)) {
            previous.abort();
        }
        self.imp().realtime_token.replace(Some(token_tx));

        let app = self.clone();
        glib::timeout_add_local(POLL_INTERVAL, move || {
            loop {
                match rx.try_recv() {
                    Ok(message) => app.receive_message(message),
                    Err(TryRecvError::Empty) => return glib::ControlFlow::Continue,
                    Err(TryRecvError::Disconnected) => return glib::ControlFlow::Break,
                }
            }
        });
    }

    fn receive_message(&self, message: Message) {
        let appended = self
            .imp()
            .dashboard
            .borrow_mut()
            .push_message(message.clone());
        if appended && let Some(chat) = self.window().and_then(|w| w.chat_view()) {
            chat.append_message(message);
        }
    }

    /// Leaves the open channel's topic; the poller stops once the sender is gone
    fn stop_realtime(&self) {
        self.imp().realtime_token.take();
        if let Some(task) = self.imp().realtime_task.take() {
            task.abort();
        }
    }

    // Messaging

    fn send_message(&self, content: String) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };
        let Some(channel_id) = self
            .imp()
            .dashboard
            .borrow()
            .selected_channel_id()
            .map(str::to_string)
        else {
            return;
        };

        self.spawn_then(
            async move {
                backend
                    .client
                    .send_message(&channel_id, &user_id, &content)
                    .await
            },
            |app, result| {
                let chat = app.window().and_then(|w| w.chat_view());
                match result {
                    Ok(_) => {
                        if let Some(chat) = &chat {
                            chat.clear_composer();
                        }
                    }
                    Err(e) => {
                        error!("Failed to send message: {}", e);
                        app.toast(&format!("Message not sent: {}", e));
                    }
                }
                // Still disabled if the channel went away meanwhile
                let channel_open = app.imp().dashboard.borrow().selected_channel_id().is_some();
                if let Some(chat) = chat {
                    chat.set_can_send(channel_open);
                }
            },
        );
    }

    // Servers and channels

    fn open_create_server_dialog(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let dialog = NameDialog::for_server(&window);
        let dialog_weak = dialog.downgrade();

        let app = self.clone();
        dialog.connect_submit(move |name| {
            let (Some(backend), Some(user_id)) = (app.backend(), app.user_id()) else {
                return;
            };
            let Some(dialog) = dialog_weak.upgrade() else {
                return;
            };
            dialog.set_loading(true);
            dialog.hide_error();

            let dialog_weak = dialog.downgrade();
            app.spawn_then(
                async move { backend.client.create_server(&user_id, &name).await },
                move |app, result| match result {
                    Ok(server) => {
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.close();
                        }
                        let server_id = server.id.clone();
                        app.imp().dashboard.borrow_mut().add_server(server);
                        app.select_server(server_id);
                    }
                    Err(e) => {
                        error!("Failed to create server: {}", e);
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.set_loading(false);
                            dialog.show_error(&e.to_string());
                        }
                    }
                },
            );
        });

        dialog.present();
    }

    fn open_create_channel_dialog(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let Some(server_id) = self
            .imp()
            .dashboard
            .borrow()
            .selected_server_id()
            .map(str::to_string)
        else {
            return;
        };
        let dialog = NameDialog::for_channel(&window);
        let dialog_weak = dialog.downgrade();

        let app = self.clone();
        dialog.connect_submit(move |name| {
            let Some(backend) = app.backend() else {
                return;
            };
            let Some(dialog) = dialog_weak.upgrade() else {
                return;
            };
            dialog.set_loading(true);
            dialog.hide_error();

            let server_id = server_id.clone();
            let dialog_weak = dialog.downgrade();
            app.spawn_then(
                async move { backend.client.create_channel(&server_id, &name).await },
                move |app, result| match result {
                    Ok(channel) => {
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.close();
                        }
                        let channel_id = channel.id.clone();
                        let same_server = {
                            let mut dashboard = app.imp().dashboard.borrow_mut();
                            let same = dashboard.selected_server_id()
                                == Some(channel.server_id.as_str());
                            if same {
                                dashboard.add_channel(channel);
                            }
                            same
                        };
                        if same_server {
                            app.sync_channels();
                            app.select_channel(&channel_id);
                        }
                    }
                    Err(e) => {
                        error!("Failed to create channel: {}", e);
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.set_loading(false);
                            dialog.show_error(&e.to_string());
                        }
                    }
                },
            );
        });

        dialog.present();
    }

    fn open_server_settings(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let Some(user_id) = self.user_id() else {
            return;
        };
        let (server, is_owner) = {
            let dashboard = self.imp().dashboard.borrow();
            let Some(server) = dashboard.selected_server().cloned() else {
                return;
            };
            (server, dashboard.is_server_owner(&user_id))
        };
        let is_admin = self
            .imp()
            .profile
            .borrow()
            .as_ref()
            .is_some_and(|p| p.is_owner);

        let dialog = ServerSettingsDialog::new(&window, &server);
        dialog.set_can_delete(is_owner || is_admin);
        let dialog_weak = dialog.downgrade();

        let app = self.clone();
        dialog.connect_delete(move || {
            let Some(backend) = app.backend() else {
                return;
            };
            let Some(dialog) = dialog_weak.upgrade() else {
                return;
            };
            dialog.set_loading(true);

            let server_id = server.id.clone();
            let dialog_weak = dialog.downgrade();
            app.spawn_then(
                {
                    let server_id = server_id.clone();
                    async move { backend.client.delete_server(&server_id).await }
                },
                move |app, result| match result {
                    Ok(()) => {
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.close();
                        }
                        app.forget_server(&server_id);
                        app.toast("Server deleted");
                    }
                    Err(e) => {
                        error!("Failed to delete server: {}", e);
                        if let Some(dialog) = dialog_weak.upgrade() {
                            dialog.set_loading(false);
                            dialog.show_error(&e.to_string());
                        }
                    }
                },
            );
        });

        dialog.present();
    }

    fn forget_server(&self, server_id: &str) {
        let was_open = self.imp().dashboard.borrow().selected_server_id() == Some(server_id);
        self.imp().dashboard.borrow_mut().remove_server(server_id);
        if was_open {
            self.stop_realtime();
        }
        self.sync_navigation();
    }

    // Friends

    fn load_friends(&self) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };

        let owner = user_id.clone();
        self.spawn_then(
            async move { backend.client.friendships(&user_id).await },
            move |app, result| match result {
                Ok(friendships) => {
                    debug!("Loaded {} friendships", friendships.len());
                    if app.user_id().as_deref() != Some(owner.as_str()) {
                        return;
                    }
                    let friends = FriendList::new(&owner, friendships);
                    if let Some(panel) = app.window().and_then(|w| w.friends_panel()) {
                        panel.set_friends(&friends);
                    }
                    app.imp().friends.replace(friends);
                }
                Err(e) => {
                    error!("Failed to load friends: {}", e);
                    app.toast(&format!("Couldn't load friends: {}", e));
                }
            },
        );
    }

    fn search_profiles(&self, term: String) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };
        let Some(panel) = self.window().and_then(|w| w.friends_panel()) else {
            return;
        };
        panel.set_search_loading(true);

        self.spawn_then(
            async move { backend.client.search_profiles(&user_id, &term).await },
            move |app, result| {
                panel.set_search_loading(false);
                match result {
                    Ok(results) => {
                        panel.set_search_results(&results, &app.imp().friends.borrow());
                    }
                    Err(e) => {
                        error!("User search failed: {}", e);
                        app.toast(&format!("Search failed: {}", e));
                    }
                }
            },
        );
    }

    fn send_friend_request(&self, friend_id: String) {
        let (Some(backend), Some(user_id)) = (self.backend(), self.user_id()) else {
            return;
        };

        self.spawn_then(
            async move {
                backend
                    .client
                    .send_friend_request(&user_id, &friend_id)
                    .await
            },
            |app, result| match result {
                Ok(_) => {
                    app.toast("Friend request sent");
                    if let Some(panel) = app.window().and_then(|w| w.friends_panel()) {
                        panel.reset_search();
                        panel.show_tab("pending");
                    }
                    app.load_friends();
                }
                Err(e) => {
                    error!("Failed to send friend request: {}", e);
                    app.toast(&format!("Couldn't send request: {}", e));
                }
            },
        );
    }

    fn accept_friend_request(&self, friendship_id: String) {
        let Some(backend) = self.backend() else {
            return;
        };

        self.spawn_then(
            async move { backend.client.accept_friend_request(&friendship_id).await },
            |app, result| match result {
                Ok(()) => app.load_friends(),
                Err(e) => {
                    error!("Failed to accept friend request: {}", e);
                    app.toast(&format!("Couldn't accept request: {}", e));
                }
            },
        );
    }

    fn remove_friendship(&self, friendship_id: String) {
        let Some(backend) = self.backend() else {
            return;
        };

        self.spawn_then(
            async move { backend.client.remove_friendship(&friendship_id).await },
            |app, result| match result {
                Ok(()) => app.load_friends(),
                Err(e) => {
                    error!("Failed to remove friendship: {}", e);
                    app.toast(&format!("Couldn't update friends: {}", e));
                }
            },
        );
    }

    // Account

    fn open_user_settings(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let Some(profile) = self.imp().profile.borrow().clone() else {
            return;
        };
        let dialog = UserSettingsDialog::new(&window, &profile);
        let dialog_weak = dialog.downgrade();

        let app = self.clone();
        let weak = dialog_weak.clone();
        dialog.connect_save_display_name(move |name| {
            let (Some(backend), Some(user_id)) = (app.backend(), app.user_id()) else {
                return;
            };
            if let Some(dialog) = weak.upgrade() {
                dialog.set_loading(true);
            }

            let weak = weak.clone();
            app.spawn_then(
                async move {
                    let client = &backend.client;
                    client.update_display_name(&user_id, &name).await?;
                    client.profile(&user_id).await
                },
                move |app, result: Result<Profile, ClientError>| {
                    let dialog = weak.upgrade();
                    if let Some(dialog) = dialog.as_ref() {
                        dialog.set_loading(false);
                    }
                    match result {
                        Ok(profile) => {
                            if let Some(dialog) = dialog.as_ref() {
                                dialog.set_profile(&profile);
                                dialog.show_info("Display name saved");
                            }
                            app.set_own_profile(profile);
                        }
                        Err(e) => {
                            error!("Failed to update display name: {}", e);
                            if let Some(dialog) = dialog.as_ref() {
                                dialog.show_error(&e.to_string());
                            }
                        }
                    }
                },
            );
        });

        let app = self.clone();
        let weak = dialog_weak.clone();
        dialog.connect_change_password(move |password, confirmation| {
            let Some(backend) = app.backend() else {
                return;
            };
            let Some(session) = app.imp().session.borrow().clone() else {
                return;
            };
            if let Some(dialog) = weak.upgrade() {
                dialog.set_loading(true);
            }

            let weak = weak.clone();
            app.spawn_then(
                async move {
                    backend
                        .auth
                        .update_password(&session, &password, &confirmation)
                        .await
                },
                move |_, result| {
                    let Some(dialog) = weak.upgrade() else {
                        return;
                    };
                    dialog.clear_passwords();
                    dialog.set_loading(false);
                    match result {
                        Ok(()) => {
                            info!("Password changed");
                            dialog.show_info("Password changed");
                        }
                        Err(e) => {
                            warn!("Password change failed: {}", e);
                            dialog.show_error(&e.to_string());
                        }
                    }
                },
            );
        });

        let app = self.clone();
        dialog.connect_sign_out(move || {
            if let Some(dialog) = dialog_weak.upgrade() {
                dialog.close();
            }
            app.sign_out();
        });

        dialog.present();
    }

    // Admin

    fn open_admin_panel(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let is_admin = self
            .imp()
            .profile
            .borrow()
            .as_ref()
            .is_some_and(|p| p.is_owner);
        if !is_admin {
            return;
        }

        let panel = AdminPanel::new(&window);
        let panel_weak = panel.downgrade();

        let app = self.clone();
        let weak = panel_weak.clone();
        panel.connect_refresh(move || {
            if let Some(panel) = weak.upgrade() {
                app.load_admin_overview(&panel);
            }
        });

        let app = self.clone();
        let weak = panel_weak.clone();
        panel.connect_delete_user(move |profile_id| {
            let Some(backend) = app.backend() else {
                return;
            };
            let weak = weak.clone();
            app.spawn_then(
                {
                    let profile_id = profile_id.clone();
                    async move { backend.client.delete_profile(&profile_id).await }
                },
                move |app, result| {
                    match result {
                        Ok(()) => {
                            if let Some(db) = app.imp().cache.borrow().as_ref()
                                && let Err(e) = ProfileCache::new(db).remove(&profile_id)
                            {
                                warn!("Failed to evict deleted profile: {}", e);
                            }
                            app.toast("User deleted");
                        }
                        Err(e) => {
                            error!("Failed to delete user: {}", e);
                            app.toast(&format!("Couldn't delete user: {}", e));
                        }
                    }
                    if let Some(panel) = weak.upgrade() {
                        app.load_admin_overview(&panel);
                    }
                },
            );
        });

        let app = self.clone();
        panel.connect_delete_server(move |server_id| {
            let Some(backend) = app.backend() else {
                return;
            };
            let weak = panel_weak.clone();
            app.spawn_then(
                {
                    let server_id = server_id.clone();
                    async move { backend.client.delete_server(&server_id).await }
                },
                move |app, result| {
                    match result {
                        Ok(()) => {
                            app.forget_server(&server_id);
                            app.toast("Server deleted");
                        }
                        Err(e) => {
                            error!("Failed to delete server: {}", e);
                            app.toast(&format!("Couldn't delete server: {}", e));
                        }
                    }
                    if let Some(panel) = weak.upgrade() {
                        app.load_admin_overview(&panel);
                    }
                },
            );
        });

        panel.present();
        self.load_admin_overview(&panel);
    }

    fn load_admin_overview(&self, panel: &AdminPanel) {
        let Some(backend) = self.backend() else {
            return;
        };
        panel.set_loading(true);

        let weak = panel.downgrade();
        self.spawn_then(
            async move { backend.client.admin_overview().await },
            move |app, result| {
                let Some(panel) = weak.upgrade() else {
                    return;
                };
                panel.set_loading(false);
                match result {
                    Ok(overview) => {
                        debug!(
                            "Admin overview: {} users, {} servers, {} messages",
                            overview.total_users(),
                            overview.total_servers(),
                            overview.total_messages
                        );
                        panel.set_overview(&overview);
                    }
                    Err(e) => {
                        error!("Failed to load admin overview: {}", e);
                        app.toast(&format!("Couldn't load admin data: {}", e));
                    }
                }
            },
        );
    }
}

impl Default for ParleyApplication {
    fn default() -> Self {
        Self::new()
    }
}

/// A refresh answer only applies to the session that asked for it
fn refresh_still_current(current_user: Option<&str>, refreshed_user: &str) -> bool {
    current_user == Some(refreshed_user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_applies_to_same_signed_in_user() {
        assert!(refresh_still_current(Some("u1"), "u1"));
    }

    #[test]
    fn test_refresh_discarded_after_sign_out_or_user_switch() {
        assert!(!refresh_still_current(None, "u1"));
        assert!(!refresh_still_current(Some("u2"), "u1"));
    }
}
