// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

//! Friends home: accepted friends, pending requests and user search.

use crate::state::FriendList;
use crate::state::validation::initials;
use crate::supabase::{Friendship, Profile};
use crate::ui::avatar_cache;
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;
use libadwaita::prelude::*;

mod imp {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct FriendsPanel {
        pub stack: RefCell<Option<gtk4::Stack>>,
        pub all_list: RefCell<Option<gtk4::ListBox>>,
        pub incoming_list: RefCell<Option<gtk4::ListBox>>,
        pub outgoing_list: RefCell<Option<gtk4::ListBox>>,
        pub search_entry: RefCell<Option<gtk4::SearchEntry>>,
        pub results_list: RefCell<Option<gtk4::ListBox>>,
        pub search_spinner: RefCell<Option<gtk4::Spinner>>,
        pub search_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
        pub request_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
        pub accept_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
        pub remove_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
        pub message_callback: RefCell<Option<Box<dyn Fn(Profile) + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for FriendsPanel {
        const NAME: &'static str = "ParleyFriendsPanel";
        type Type = super::FriendsPanel;
        type ParentType = gtk4::Box;
    }

    impl ObjectImpl for FriendsPanel {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for FriendsPanel {}
    impl BoxImpl for FriendsPanel {}
}

glib::wrapper! {
    pub struct FriendsPanel(ObjectSubclass<imp::FriendsPanel>)
        @extends gtk4::Box, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget, gtk4::Orientable;
}

impl FriendsPanel {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("orientation", gtk4::Orientation::Vertical)
            .property("spacing", 0)
            .build()
    }

    fn setup_ui(&self) {
        self.set_hexpand(true);

        let stack = gtk4::Stack::new();
        stack.set_vexpand(true);
        stack.set_transition_type(gtk4::StackTransitionType::None);

        let switcher = gtk4::StackSwitcher::new();
        switcher.set_stack(Some(&stack));

        let header = adw::HeaderBar::new();
        header.set_title_widget(Some(&switcher));
        self.append(&header);

        let (all_page, all_list) =
            section_page("Friends", "No friends yet. Add some from the Add Friend tab.");
        stack.add_titled(&all_page, Some("all"), "All");

        let pending_page = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        let (incoming_page, incoming_list) = section_page("Incoming", "No incoming requests");
        let (outgoing_page, outgoing_list) = section_page("Outgoing", "No outgoing requests");
        incoming_page.set_vexpand(false);
        pending_page.append(&incoming_page);
        pending_page.append(&outgoing_page);
        let pending_scrolled = gtk4::ScrolledWindow::new();
        pending_scrolled.set_child(Some(&pending_page));
        stack.add_titled(&pending_scrolled, Some("pending"), "Pending");

        let add_page = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
        add_page.set_margin_start(24);
        add_page.set_margin_end(24);
        add_page.set_margin_top(24);

        let hint = gtk4::Label::new(Some("Find people by their username."));
        hint.set_halign(gtk4::Align::Start);
        hint.add_css_class("dim-label");
        add_page.append(&hint);

        let search_row = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
        let search_entry = gtk4::SearchEntry::new();
        search_entry.set_hexpand(true);
        search_entry.set_placeholder_text(Some("Username"));
        search_row.append(&search_entry);
        let search_spinner = gtk4::Spinner::new();
        search_spinner.set_visible(false);
        search_row.append(&search_spinner);
        add_page.append(&search_row);

        let results_list = gtk4::ListBox::new();
        results_list.set_selection_mode(gtk4::SelectionMode::None);
        results_list.add_css_class("boxed-list");
        results_list.set_placeholder(Some(&placeholder("No users found")));
        results_list.set_visible(false);
        add_page.append(&results_list);

        stack.add_titled(&add_page, Some("add"), "Add Friend");

        search_entry.connect_activate(glib::clone!(
            #[weak(rename_to = panel)]
            self,
            move |entry| {
                let term = entry.text().trim().to_string();
                if let Some(cb) = panel.imp().search_callback.borrow().as_ref() {
                    cb(term);
                }
            }
        ));

        let clamp = adw::Clamp::new();
        clamp.set_maximum_size(720);
        clamp.set_child(Some(&stack));
        self.append(&clamp);

        let imp = self.imp();
        imp.stack.replace(Some(stack));
        imp.all_list.replace(Some(all_list));
        imp.incoming_list.replace(Some(incoming_list));
        imp.outgoing_list.replace(Some(outgoing_list));
        imp.search_entry.replace(Some(search_entry));
        imp.results_list.replace(Some(results_list));
        imp.search_spinner.replace(Some(search_spinner));
    }

    pub fn set_friends(&self, friends: &FriendList) {
        let imp = self.imp();

        if let Some(list) = imp.all_list.borrow().as_ref() {
            clear_list(list);
            for friendship in friends.accepted() {
                let row = self.friend_row(friends, friendship);
                list.append(&row);
            }
        }

        if let Some(list) = imp.incoming_list.borrow().as_ref() {
            clear_list(list);
            for friendship in friends.pending_incoming() {
                let row = self.incoming_row(friends, friendship);
                list.append(&row);
            }
        }

        if let Some(list) = imp.outgoing_list.borrow().as_ref() {
            clear_list(list);
            for friendship in friends.pending_outgoing() {
                let row = self.outgoing_row(friends, friendship);
                list.append(&row);
            }
        }
    }

    pub fn set_search_results(&self, results: &[Profile], friends: &FriendList) {
        let imp = self.imp();
        let Some(list) = imp.results_list.borrow().clone() else {
            return;
        };

        clear_list(&list);
        for profile in results {
            let row = profile_row(Some(profile));

            let add_btn = gtk4::Button::with_label("Add");
            add_btn.set_valign(gtk4::Align::Center);
            if friends.is_related(&profile.id) {
                add_btn.set_label("Added");
                add_btn.set_sensitive(false);
            } else {
                add_btn.add_css_class("suggested-action");
                let friend_id = profile.id.clone();
                add_btn.connect_clicked(glib::clone!(
                    #[weak(rename_to = panel)]
                    self,
                    move |btn| {
                        btn.set_sensitive(false);
                        if let Some(cb) = panel.imp().request_callback.borrow().as_ref() {
                            cb(friend_id.clone());
                        }
                    }
                ));
            }
            row.add_suffix(&add_btn);
            list.append(&row);
        }
        list.set_visible(true);
    }

    pub fn set_search_loading(&self, loading: bool) {
        if let Some(spinner) = self.imp().search_spinner.borrow().as_ref() {
            spinner.set_visible(loading);
            if loading {
                spinner.start();
            } else {
                spinner.stop();
            }
        }
    }

    /// Clear the search after a request was sent
    pub fn reset_search(&self) {
        let imp = self.imp();
        if let Some(entry) = imp.search_entry.borrow().as_ref() {
            entry.set_text("");
        }
        if let Some(list) = imp.results_list.borrow().as_ref() {
            clear_list(list);
            list.set_visible(false);
        }
    }

    pub fn show_tab(&self, name: &str) {
        if let Some(stack) = self.imp().stack.borrow().as_ref() {
            stack.set_visible_child_name(name);
        }
    }

    fn friend_row(&self, friends: &FriendList, friendship: &Friendship) -> adw::ActionRow {
        let profile = friends.counterpart(friendship).cloned();
        let row = profile_row(profile.as_ref());

        let message_btn = gtk4::Button::from_icon_name("chat-message-new-symbolic");
        message_btn.add_css_class("flat");
        message_btn.set_valign(gtk4::Align::Center);
        message_btn.set_tooltip_text(Some("Message"));
        if let Some(profile) = profile {
            message_btn.connect_clicked(glib::clone!(
                #[weak(rename_to = panel)]
                self,
                move |_| {
                    if let Some(cb) = panel.imp().message_callback.borrow().as_ref() {
                        cb(profile.clone());
                    }
                }
            ));
        }
        row.add_suffix(&message_btn);

        let remove_btn = self.remove_button("user-trash-symbolic", "Remove Friend", &friendship.id);
        row.add_suffix(&remove_btn);
        row
    }

    fn incoming_row(&self, friends: &FriendList, friendship: &Friendship) -> adw::ActionRow {
        let row = profile_row(friends.counterpart(friendship));

        let accept_btn = gtk4::Button::from_icon_name("object-select-symbolic");
        accept_btn.add_css_class("flat");
        accept_btn.add_css_class("success");
        accept_btn.set_valign(gtk4::Align::Center);
        accept_btn.set_tooltip_text(Some("Accept"));
        let id = friendship.id.clone();
        accept_btn.connect_clicked(glib::clone!(
            #[weak(rename_to = panel)]
            self,
            move |btn| {
                btn.set_sensitive(false);
                if let Some(cb) = panel.imp().accept_callback.borrow().as_ref() {
                    cb(id.clone());
                }
            }
        ));
        row.add_suffix(&accept_btn);

        let decline_btn = self.remove_button("window-close-symbolic", "Decline", &friendship.id);
        row.add_suffix(&decline_btn);
        row
    }

    fn outgoing_row(&self, friends: &FriendList, friendship: &Friendship) -> adw::ActionRow {
        let row = profile_row(friends.counterpart(friendship));
        let cancel_btn =
            self.remove_button("window-close-symbolic", "Cancel Request", &friendship.id);
        row.add_suffix(&cancel_btn);
        row
    }

    /// Decline, cancel and unfriend all delete the friendship row
    fn remove_button(&self, icon: &str, tooltip: &str, friendship_id: &str) -> gtk4::Button {
        let btn = gtk4::Button::from_icon_name(icon);
        btn.add_css_class("flat");
        btn.set_valign(gtk4::Align::Center);
        btn.set_tooltip_text(Some(tooltip));
        let id = friendship_id.to_string();
        btn.connect_clicked(glib::clone!(
            #[weak(rename_to = panel)]
            self,
            move |btn| {
                btn.set_sensitive(false);
                if let Some(cb) = panel.imp().remove_callback.borrow().as_ref() {
                    cb(id.clone());
                }
            }
        ));
        btn
    }

    pub fn connect_search<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp().search_callback.replace(Some(Box::new(callback)));
    }

    pub fn connect_request<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp().request_callback.replace(Some(Box::new(callback)));
    }

    pub fn connect_accept<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp().accept_callback.replace(Some(Box::new(callback)));
    }

    pub fn connect_remove<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp().remove_callback.replace(Some(Box::new(callback)));
    }

    pub fn connect_message<F: Fn(Profile) + 'static>(&self, callback: F) {
        self.imp().message_callback.replace(Some(Box::new(callback)));
    }
}

impl Default for FriendsPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// A titled boxed list
fn section_page(title: &str, empty_text: &str) -> (gtk4::Box, gtk4::ListBox) {
    let page = gtk4::Box::new(gtk4::Orientation::Vertical, 8);
    page.set_vexpand(true);
    page.set_margin_start(24);
    page.set_margin_end(24);
    page.set_margin_top(24);

    let label = gtk4::Label::new(Some(title));
    label.add_css_class("heading");
    label.set_halign(gtk4::Align::Start);
    page.append(&label);

    let list = gtk4::ListBox::new();
    list.set_selection_mode(gtk4::SelectionMode::None);
    list.add_css_class("boxed-list");
    list.set_placeholder(Some(&placeholder(empty_text)));
    page.append(&list);

    (page, list)
}

fn profile_row(profile: Option<&Profile>) -> adw::ActionRow {
    let row = adw::ActionRow::new();
    let (title, username, avatar_url) = match profile {
        Some(p) => (p.display_label(), Some(p.username.as_str()), p.avatar_url.as_deref()),
        None => ("Unknown user", None, None),
    };

    row.set_title(&glib::markup_escape_text(title));
    if let Some(username) = username {
        row.set_subtitle(&glib::markup_escape_text(&format!("@{username}")));
    }

    let avatar = adw::Avatar::new(32, Some(&initials(title)), true);
    if let Some(url) = avatar_url {
        avatar_cache::load_avatar(&avatar, url);
    }
    row.add_prefix(&avatar);
    row
}

fn clear_list(list: &gtk4::ListBox) {
    while let Some(row) = list.row_at_index(0) {
        list.remove(&row);
    }
}

fn placeholder(text: &str) -> gtk4::Label {
    let label = gtk4::Label::new(Some(text));
    label.add_css_class("dim-label");
    label.set_margin_top(12);
    label.set_margin_bottom(12);
    label
}
