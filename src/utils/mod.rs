pub mod db_utils;
pub mod email_index;
pub mod image_storage;
pub mod notification;
