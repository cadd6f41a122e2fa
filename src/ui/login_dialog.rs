// SPDX-License-Identifier: MPL-2.0

use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;

mod imp {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    pub struct LoginDialog {
        pub email_entry: RefCell<Option<gtk4::Entry>>,
        pub password_entry: RefCell<Option<gtk4::PasswordEntry>>,
        pub username_box: RefCell<Option<gtk4::Box>>,
        pub username_entry: RefCell<Option<gtk4::Entry>>,
        pub description: RefCell<Option<gtk4::Label>>,
        pub submit_button: RefCell<Option<gtk4::Button>>,
        pub mode_button: RefCell<Option<gtk4::Button>>,
        pub spinner: RefCell<Option<gtk4::Spinner>>,
        pub error_label: RefCell<Option<gtk4::Label>>,
        pub info_label: RefCell<Option<gtk4::Label>>,
        pub sign_up_mode: Cell<bool>,
        pub sign_in_callback: RefCell<Option<Box<dyn Fn(&super::LoginDialog)>>>,
        pub sign_up_callback: RefCell<Option<Box<dyn Fn(&super::LoginDialog)>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for LoginDialog {
        const NAME: &'static str = "ParleyLoginDialog";
        type Type = super::LoginDialog;
        type ParentType = gtk4::Window;
    }

    impl ObjectImpl for LoginDialog {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for LoginDialog {}
    impl WindowImpl for LoginDialog {}
}

glib::wrapper! {
    pub struct LoginDialog(ObjectSubclass<imp::LoginDialog>)
        @extends gtk4::Window, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget,
                    gtk4::Native, gtk4::Root, gtk4::ShortcutManager;
}

impl LoginDialog {
    pub fn new(parent: &impl IsA<gtk4::Window>) -> Self {
        glib::Object::builder()
            .property("title", "Sign In to Parley")
            .property("modal", true)
            .property("transient-for", parent)
            .property("default-width", 400)
            .property("resizable", false)
            .property("deletable", false)
            .build()
    }

    fn setup_ui(&self) {
        let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);

        let header = adw::HeaderBar::new();
        header.set_show_start_title_buttons(false);
        header.set_show_end_title_buttons(false);
        content.append(&header);

        let form_box = gtk4::Box::new(gtk4::Orientation::Vertical, 16);
        form_box.set_margin_start(24);
        form_box.set_margin_end(24);
        form_box.set_margin_top(16);
        form_box.set_margin_bottom(24);

        let desc = gtk4::Label::new(Some("Sign in with your email and password."));
        desc.set_wrap(true);
        desc.set_halign(gtk4::Align::Start);
        desc.add_css_class("dim-label");
        form_box.append(&desc);

        let (email_box, email_entry) = labeled_entry("Email");
        email_entry.set_placeholder_text(Some("you@example.com"));
        email_entry.set_input_purpose(gtk4::InputPurpose::Email);
        form_box.append(&email_box);

        let (username_box, username_entry) = labeled_entry("Username");
        username_entry.set_placeholder_text(Some("letters, digits and _"));
        username_box.set_visible(false);
        form_box.append(&username_box);

        let password_box = gtk4::Box::new(gtk4::Orientation::Vertical, 4);
        let password_label = gtk4::Label::new(Some("Password"));
        password_label.set_halign(gtk4::Align::Start);
        password_label.add_css_class("dim-label");
        password_box.append(&password_label);

        let password_entry = gtk4::PasswordEntry::new();
        password_entry.set_show_peek_icon(true);
        password_box.append(&password_entry);
        form_box.append(&password_box);

        let error_label = gtk4::Label::new(None);
        error_label.set_halign(gtk4::Align::Start);
        error_label.add_css_class("error");
        error_label.set_visible(false);
        error_label.set_wrap(true);
        form_box.append(&error_label);

        let info_label = gtk4::Label::new(None);
        info_label.set_halign(gtk4::Align::Start);
        info_label.add_css_class("success");
        info_label.set_visible(false);
        info_label.set_wrap(true);
        form_box.append(&info_label);

        let button_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
        button_box.set_margin_top(8);

        let mode_button = gtk4::Button::with_label("Create an account");
        mode_button.add_css_class("flat");
        mode_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                dialog.set_sign_up_mode(!dialog.imp().sign_up_mode.get());
            }
        ));
        button_box.append(&mode_button);

        let spacer = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
        spacer.set_hexpand(true);
        button_box.append(&spacer);

        let spinner = gtk4::Spinner::new();
        spinner.set_visible(false);
        button_box.append(&spinner);

        let submit_button = gtk4::Button::with_label("Sign In");
        submit_button.add_css_class("suggested-action");
        submit_button.set_sensitive(false);
        submit_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                dialog.submit();
            }
        ));
        button_box.append(&submit_button);

        form_box.append(&button_box);
        content.append(&form_box);

        email_entry.connect_changed(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.update_sensitivity()
        ));
        username_entry.connect_changed(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.update_sensitivity()
        ));
        password_entry.connect_changed(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.update_sensitivity()
        ));
        password_entry.connect_activate(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.submit()
        ));

        let imp = self.imp();
        imp.email_entry.replace(Some(email_entry));
        imp.password_entry.replace(Some(password_entry));
        imp.username_box.replace(Some(username_box));
        imp.username_entry.replace(Some(username_entry));
        imp.description.replace(Some(desc));
        imp.submit_button.replace(Some(submit_button));
        imp.mode_button.replace(Some(mode_button));
        imp.spinner.replace(Some(spinner));
        imp.error_label.replace(Some(error_label));
        imp.info_label.replace(Some(info_label));

        self.set_child(Some(&content));
    }

    fn set_sign_up_mode(&self, sign_up: bool) {
        let imp = self.imp();
        imp.sign_up_mode.set(sign_up);

        let (title, description, submit, switch) = if sign_up {
            (
                "Create a Parley Account",
                "Pick a username. It can't be changed later.",
                "Sign Up",
                "I already have an account",
            )
        } else {
            (
                "Sign In to Parley",
                "Sign in with your email and password.",
                "Sign In",
                "Create an account",
            )
        };

        self.set_title(Some(title));
        if let Some(label) = imp.description.borrow().as_ref() {
            label.set_text(description);
        }
        if let Some(button) = imp.submit_button.borrow().as_ref() {
            button.set_label(submit);
        }
        if let Some(button) = imp.mode_button.borrow().as_ref() {
            button.set_label(switch);
        }
        if let Some(username_box) = imp.username_box.borrow().as_ref() {
            username_box.set_visible(sign_up);
        }

        self.hide_error();
        self.update_sensitivity();
    }

    fn update_sensitivity(&self) {
        let ready = !self.email().is_empty()
            && !self.password().is_empty()
            && (!self.imp().sign_up_mode.get() || !self.username().is_empty());
        if let Some(button) = self.imp().submit_button.borrow().as_ref() {
            button.set_sensitive(ready);
        }
    }

    fn submit(&self) {
        let imp = self.imp();
        if !imp
            .submit_button
            .borrow()
            .as_ref()
            .is_some_and(|b| b.is_sensitive())
        {
            return;
        }

        let callback = if imp.sign_up_mode.get() {
            &imp.sign_up_callback
        } else {
            &imp.sign_in_callback
        };
        if let Some(cb) = callback.borrow().as_ref() {
            cb(self);
        }
    }

    pub fn email(&self) -> String {
        self.imp()
            .email_entry
            .borrow()
            .as_ref()
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default()
    }

    pub fn set_email(&self, email: &str) {
        if let Some(entry) = self.imp().email_entry.borrow().as_ref() {
            entry.set_text(email);
        }
    }

    pub fn password(&self) -> String {
        self.imp()
            .password_entry
            .borrow()
            .as_ref()
            .map(|e| e.text().to_string())
            .unwrap_or_default()
    }

    pub fn username(&self) -> String {
        self.imp()
            .username_entry
            .borrow()
            .as_ref()
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default()
    }

    pub fn show_error(&self, message: &str) {
        if let Some(label) = self.imp().info_label.borrow().as_ref() {
            label.set_visible(false);
        }
        if let Some(label) = self.imp().error_label.borrow().as_ref() {
            label.set_text(message);
            label.set_visible(true);
        }
    }

    pub fn hide_error(&self) {
        if let Some(label) = self.imp().error_label.borrow().as_ref() {
            label.set_visible(false);
        }
    }

    /// Non-error notice, e.g. "check your inbox"
    pub fn show_info(&self, message: &str) {
        self.hide_error();
        if let Some(label) = self.imp().info_label.borrow().as_ref() {
            label.set_text(message);
            label.set_visible(true);
        }
    }

    /// Back to sign-in after an account was created that still needs confirming
    pub fn switch_to_sign_in(&self) {
        self.set_sign_up_mode(false);
    }

    pub fn set_loading(&self, loading: bool) {
        let imp = self.imp();

        if let Some(spinner) = imp.spinner.borrow().as_ref() {
            spinner.set_visible(loading);
            if loading {
                spinner.start();
            } else {
                spinner.stop();
            }
        }

        if let Some(button) = imp.submit_button.borrow().as_ref() {
            button.set_sensitive(!loading);
        }
        if let Some(button) = imp.mode_button.borrow().as_ref() {
            button.set_sensitive(!loading);
        }
        if let Some(entry) = imp.email_entry.borrow().as_ref() {
            entry.set_sensitive(!loading);
        }
        if let Some(entry) = imp.username_entry.borrow().as_ref() {
            entry.set_sensitive(!loading);
        }
        if let Some(entry) = imp.password_entry.borrow().as_ref() {
            entry.set_sensitive(!loading);
        }

        if !loading {
            self.update_sensitivity();
        }
    }

    pub fn connect_sign_in<F: Fn(&Self) + 'static>(&self, f: F) {
        self.imp().sign_in_callback.replace(Some(Box::new(f)));
    }

    pub fn connect_sign_up<F: Fn(&Self) + 'static>(&self, f: F) {
        self.imp().sign_up_callback.replace(Some(Box::new(f)));
    }
}

fn labeled_entry(label: &str) -> (gtk4::Box, gtk4::Entry) {
    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 4);
    let title = gtk4::Label::new(Some(label));
    title.set_halign(gtk4::Align::Start);
    title.add_css_class("dim-label");
    container.append(&title);

    let entry = gtk4::Entry::new();
    container.append(&entry);
    (container, entry)
}

impl Default for LoginDialog {
    fn default() -> Self {
        panic!("LoginDialog requires a parent window")
    }
}
