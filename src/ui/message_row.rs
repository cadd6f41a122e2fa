// SPDX-License-Identifier: MPL-2.0

use crate::state::validation::initials;
use crate::supabase::{Message, format_date, format_time};
use crate::ui::avatar_cache;
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;
use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s<>\[\]{}|\\^`\x00-\x1f\x7f]+").expect("invalid url pattern")
});

mod imp {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct MessageRow {
        pub avatar: RefCell<Option<adw::Avatar>>,
        pub sender_label: RefCell<Option<gtk4::Label>>,
        pub owner_badge: RefCell<Option<gtk4::Label>>,
        pub timestamp_label: RefCell<Option<gtk4::Label>>,
        pub content_label: RefCell<Option<gtk4::Label>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for MessageRow {
        const NAME: &'static str = "ParleyMessageRow";
        type Type = super::MessageRow;
        type ParentType = gtk4::Box;
    }

    impl ObjectImpl for MessageRow {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for MessageRow {}
    impl BoxImpl for MessageRow {}
}

glib::wrapper! {
    pub struct MessageRow(ObjectSubclass<imp::MessageRow>)
        @extends gtk4::Box, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget, gtk4::Orientable;
}

impl MessageRow {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("orientation", gtk4::Orientation::Horizontal)
            .property("spacing", 12)
            .build()
    }

    fn setup_ui(&self) {
        self.set_margin_start(16);
        self.set_margin_end(16);
        self.set_margin_top(6);
        self.set_margin_bottom(6);
        self.add_css_class("message-row");

        let avatar = adw::Avatar::new(40, None, true);
        avatar.set_valign(gtk4::Align::Start);
        self.append(&avatar);

        let content_column = gtk4::Box::new(gtk4::Orientation::Vertical, 2);
        content_column.set_hexpand(true);

        let header = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);

        let sender = gtk4::Label::new(None);
        sender.set_halign(gtk4::Align::Start);
        sender.add_css_class("heading");
        sender.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        header.append(&sender);

        let badge = gtk4::Label::new(Some("OWNER"));
        badge.add_css_class("owner-badge");
        badge.set_visible(false);
        header.append(&badge);

        let timestamp = gtk4::Label::new(None);
        timestamp.add_css_class("dim-label");
        timestamp.add_css_class("caption");
        header.append(&timestamp);

        content_column.append(&header);

        let content = gtk4::Label::new(None);
        content.set_halign(gtk4::Align::Start);
        content.set_xalign(0.0);
        content.set_wrap(true);
        content.set_wrap_mode(gtk4::pango::WrapMode::WordChar);
        content.set_selectable(true);
        content.set_use_markup(true);
        content_column.append(&content);

        self.append(&content_column);

        let imp = self.imp();
        imp.avatar.replace(Some(avatar));
        imp.sender_label.replace(Some(sender));
        imp.owner_badge.replace(Some(badge));
        imp.timestamp_label.replace(Some(timestamp));
        imp.content_label.replace(Some(content));
    }

    pub fn bind(&self, message: &Message) {
        let imp = self.imp();
        let sender = message.sender_label();

        if let Some(avatar) = imp.avatar.borrow().as_ref() {
            avatar.set_text(Some(&initials(sender)));
            if let Some(url) = message.profile.as_ref().and_then(|p| p.avatar_url.as_deref()) {
                avatar_cache::load_avatar(avatar, url);
            }
        }

        if let Some(label) = imp.sender_label.borrow().as_ref() {
            label.set_text(sender);
        }

        if let Some(badge) = imp.owner_badge.borrow().as_ref() {
            badge.set_visible(message.sender_is_owner());
        }

        if let Some(label) = imp.timestamp_label.borrow().as_ref() {
            label.set_text(&format_time(&message.created_at));
            label.set_tooltip_text(Some(&format_date(&message.created_at)));
        }

        if let Some(label) = imp.content_label.borrow().as_ref() {
            label.set_markup(&format_message_text(&message.content));
        }
    }
}

impl Default for MessageRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Pango markup for message text with http(s) links made clickable
fn format_message_text(text: &str) -> String {
    let escaped = glib::markup_escape_text(text);
    URL_RE
        .replace_all(&escaped, |caps: &regex::Captures| {
            let url = &caps[0];
            format!("<a href=\"{url}\">{url}</a>")
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_escaped() {
        assert_eq!(format_message_text("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_links_are_wrapped() {
        assert_eq!(
            format_message_text("see https://example.com/x?y=1 now"),
            "see <a href=\"https://example.com/x?y=1\">https://example.com/x?y=1</a> now"
        );
    }

    #[test]
    fn test_markup_in_links_stays_escaped() {
        let out = format_message_text("https://example.com/<b>");
        assert!(!out.contains("<b>"));
    }
}
