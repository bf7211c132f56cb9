mod admin;
mod events;
mod gallery;
mod media;
mod submissions;

pub use admin::{admin_purge, health};
pub use events::{create_event, list_event_registrations, list_events, register_for_event};
pub use gallery::{
    delete_gallery_item, get_gallery_item, list_gallery, sweep_orphans, upload_gallery_item,
};
pub use media::serve_media;
pub use submissions::{
    create_contact, create_donation, dashboard_stats, donation_total, list_contacts,
    list_donations, list_subscribers, subscribe_newsletter,
};
