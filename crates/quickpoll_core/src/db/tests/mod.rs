//! Database integration tests.

use super::*;
use crate::error::{AppError, ErrorKind};
use crate::models::poll::Poll;
use crate::models::user::Credentials;
use crate::test_support::{setup_temp_db, setup_temp_db_with, TEST_HASH_COST};
use std::sync::{Arc, Barrier};
use std::thread;

fn beer_poll() -> Poll {
    Poll::new("beer", "best beer?", ["IPA", "Stout"])
}
