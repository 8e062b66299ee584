pub mod db_utils;
pub mod local_store;
