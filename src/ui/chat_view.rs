// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

//! Channel header, message list and composer.

use super::message_row::MessageRow;
use crate::supabase::Message;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{gio, glib};
use libadwaita as adw;
use std::cell::RefCell;

mod message_object {
    use super::*;

    mod imp {
        use super::*;

        #[derive(Default)]
        pub struct MessageObject {
            pub message: RefCell<Option<Message>>,
        }

        #[glib::object_subclass]
        impl ObjectSubclass for MessageObject {
            const NAME: &'static str = "ParleyMessageObject";
            type Type = super::MessageObject;
            type ParentType = glib::Object;
        }

        impl ObjectImpl for MessageObject {}
    }

    glib::wrapper! {
        pub struct MessageObject(ObjectSubclass<imp::MessageObject>);
    }

    impl MessageObject {
        pub fn new(message: Message) -> Self {
            let obj: Self = glib::Object::builder().build();
            obj.imp().message.replace(Some(message));
            obj
        }

        pub fn message(&self) -> Option<Message> {
            self.imp().message.borrow().clone()
        }
    }
}

use message_object::MessageObject;

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct ChatView {
        pub title: RefCell<Option<gtk4::Label>>,
        pub content_stack: RefCell<Option<gtk4::Stack>>,
        pub model: RefCell<Option<gio::ListStore>>,
        pub scrolled: RefCell<Option<gtk4::ScrolledWindow>>,
        pub entry: RefCell<Option<gtk4::Entry>>,
        pub send_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ChatView {
        const NAME: &'static str = "ParleyChatView";
        type Type = super::ChatView;
        type ParentType = gtk4::Box;
    }

    impl ObjectImpl for ChatView {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for ChatView {}
    impl BoxImpl for ChatView {}
}

glib::wrapper! {
    pub struct ChatView(ObjectSubclass<imp::ChatView>)
        @extends gtk4::Box, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget, gtk4::Orientable;
}

impl ChatView {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("orientation", gtk4::Orientation::Vertical)
            .property("spacing", 0)
            .build()
    }

    fn setup_ui(&self) {
        self.set_hexpand(true);

        let header = adw::HeaderBar::new();
        let title = gtk4::Label::new(None);
        title.add_css_class("title");
        header.set_title_widget(Some(&title));
        self.append(&header);

        let model = gio::ListStore::new::<MessageObject>();
        let factory = gtk4::SignalListItemFactory::new();

        factory.connect_setup(|_, item| {
            if let Some(list_item) = item.downcast_ref::<gtk4::ListItem>() {
                list_item.set_child(Some(&MessageRow::new()));
                list_item.set_activatable(false);
            }
        });

        factory.connect_bind(|_, item| {
            if let Some(list_item) = item.downcast_ref::<gtk4::ListItem>()
                && let Some(object) = list_item.item().and_downcast::<MessageObject>()
                && let Some(message) = object.message()
                && let Some(row) = list_item.child().and_downcast::<MessageRow>()
            {
                row.bind(&message);
            }
        });

        let selection = gtk4::NoSelection::new(Some(model.clone()));
        let list_view = gtk4::ListView::new(Some(selection), Some(factory));
        list_view.add_css_class("background");

        let scrolled = gtk4::ScrolledWindow::new();
        scrolled.set_vexpand(true);
        scrolled.set_policy(gtk4::PolicyType::Never, gtk4::PolicyType::Automatic);
        scrolled.set_child(Some(&list_view));

        let empty_page = adw::StatusPage::new();
        empty_page.set_icon_name(Some("chat-bubbles-empty-symbolic"));
        empty_page.set_title("No messages yet");
        empty_page.set_description(Some("Be the first to say something."));

        let content_stack = gtk4::Stack::new();
        content_stack.set_vexpand(true);
        content_stack.set_transition_type(gtk4::StackTransitionType::None);
        content_stack.add_named(&empty_page, Some("empty"));
        content_stack.add_named(&scrolled, Some("messages"));
        self.append(&content_stack);

        let composer = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
        composer.add_css_class("composer");
        composer.set_margin_start(16);
        composer.set_margin_end(16);
        composer.set_margin_top(8);
        composer.set_margin_bottom(16);

        let entry = gtk4::Entry::new();
        entry.set_hexpand(true);
        composer.append(&entry);

        let send_btn = gtk4::Button::from_icon_name("paper-plane-symbolic");
        send_btn.add_css_class("suggested-action");
        send_btn.add_css_class("circular");
        send_btn.set_tooltip_text(Some("Send"));
        send_btn.set_sensitive(false);
        composer.append(&send_btn);

        self.append(&composer);

        let btn_weak = send_btn.downgrade();
        entry.connect_changed(move |entry| {
            if let Some(btn) = btn_weak.upgrade() {
                btn.set_sensitive(!entry.text().trim().is_empty());
            }
        });
        entry.connect_activate(glib::clone!(
            #[weak(rename_to = view)]
            self,
            move |_| view.emit_send()
        ));
        send_btn.connect_clicked(glib::clone!(
            #[weak(rename_to = view)]
            self,
            move |_| view.emit_send()
        ));

        // Follow the bottom while new rows arrive
        let adj = scrolled.vadjustment();
        adj.connect_upper_notify(glib::clone!(
            #[weak(rename_to = view)]
            self,
            move |_| view.scroll_to_bottom()
        ));

        let imp = self.imp();
        imp.title.replace(Some(title));
        imp.content_stack.replace(Some(content_stack));
        imp.model.replace(Some(model));
        imp.scrolled.replace(Some(scrolled));
        imp.entry.replace(Some(entry));
    }

    fn emit_send(&self) {
        let imp = self.imp();
        let Some(entry) = imp.entry.borrow().clone() else {
            return;
        };
        let Some(content) = composer_content(&entry.text(), !entry.is_sensitive()) else {
            return;
        };

        // Text stays until the insert succeeds; see clear_composer
        entry.set_sensitive(false);
        if let Some(cb) = imp.send_callback.borrow().as_ref() {
            cb(content);
        }
    }

    /// Drop the composer text once its message was accepted
    pub fn clear_composer(&self) {
        if let Some(entry) = self.imp().entry.borrow().as_ref() {
            entry.set_text("");
        }
    }

    pub fn set_channel_name(&self, name: &str) {
        if let Some(title) = self.imp().title.borrow().as_ref() {
            title.set_text(&format!("# {name}"));
        }
        if let Some(entry) = self.imp().entry.borrow().as_ref() {
            entry.set_placeholder_text(Some(&format!("Message #{name}")));
        }
    }

    pub fn set_messages(&self, messages: &[Message]) {
        if let Some(model) = self.imp().model.borrow().as_ref() {
            let objects: Vec<MessageObject> =
                messages.iter().cloned().map(MessageObject::new).collect();
            model.splice(0, model.n_items(), &objects);
        }
        self.update_empty_state();
    }

    pub fn append_message(&self, message: Message) {
        if let Some(model) = self.imp().model.borrow().as_ref() {
            model.append(&MessageObject::new(message));
        }
        self.update_empty_state();
    }

    pub fn clear(&self) {
        if let Some(model) = self.imp().model.borrow().as_ref() {
            model.remove_all();
        }
        if let Some(entry) = self.imp().entry.borrow().as_ref() {
            entry.set_text("");
        }
        self.update_empty_state();
    }

    /// Block the composer while there is no open channel
    pub fn set_can_send(&self, can_send: bool) {
        if let Some(entry) = self.imp().entry.borrow().as_ref() {
            entry.set_sensitive(can_send);
        }
    }

    fn update_empty_state(&self) {
        let imp = self.imp();
        let empty = imp
            .model
            .borrow()
            .as_ref()
            .is_none_or(|m| m.n_items() == 0);
        if let Some(stack) = imp.content_stack.borrow().as_ref() {
            stack.set_visible_child_name(if empty { "empty" } else { "messages" });
        }
    }

    pub fn scroll_to_bottom(&self) {
        if let Some(scrolled) = self.imp().scrolled.borrow().as_ref() {
            let adj = scrolled.vadjustment();
            adj.set_value(adj.upper() - adj.page_size());
        }
    }

    pub fn connect_send<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp().send_callback.replace(Some(Box::new(callback)));
    }
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

/// What the composer would send, or None while a send is pending or the
/// text is blank
fn composer_content(text: &str, sending: bool) -> Option<String> {
    let content = text.trim();
    (!sending && !content.is_empty()).then(|| content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composer_sends_trimmed_text() {
        assert_eq!(
            composer_content("  hello there \n", false).as_deref(),
            Some("hello there")
        );
    }

    #[test]
    fn test_composer_ignores_blank_text() {
        assert_eq!(composer_content("   ", false), None);
    }

    #[test]
    fn test_composer_holds_while_send_pending() {
        assert_eq!(composer_content("hello", true), None);
    }
}
