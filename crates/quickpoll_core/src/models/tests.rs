//! Model-level unit tests.

#[cfg(test)]
mod model_tests {
    use super::super::*;
    use crate::error::AppError;

    #[test]
    fn test_poll_new_starts_without_votes() {
        let poll = poll::Poll::new("beer", "best beer?", ["IPA", "Stout"]);

        assert_eq!(poll.name, "beer");
        assert_eq!(poll.options.len(), 2);
        assert!(poll.options.iter().all(|option| option.votes.is_empty()));
        assert!(poll.validate(true).is_ok());
    }

    #[test]
    fn test_poll_validation_matrix() {
        let cases = [
            (poll::Poll::new("", "q?", ["a"]), "Name is required"),
            (poll::Poll::new("best beer", "q?", ["a"]), "alphanumeric"),
            (poll::Poll::new("beer_2", "q?", ["a"]), "alphanumeric"),
            (poll::Poll::new("beer", "", ["a"]), "Question is required"),
            (poll::Poll::new("beer", "q?", [""]), "Response is required"),
            (poll::Poll::new("beer", "q?", ["a", "a"]), "Duplicate response"),
        ];

        for (poll, fragment) in cases {
            let err = poll.validate(false).expect_err("invalid poll");
            assert!(
                matches!(err, AppError::Validation(ref msg) if msg.contains(fragment)),
                "expected '{}' for {:?}, got {}",
                fragment,
                poll,
                err
            );
        }
    }

    #[test]
    fn test_poll_options_required_only_when_configured() {
        let poll = poll::Poll::new("empty", "anything?", Vec::<String>::new());
        assert!(poll.validate(false).is_ok());
        assert!(matches!(
            poll.validate(true),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_record_vote_moves_user_between_options() {
        let mut poll = poll::Poll::new("beer", "best beer?", ["IPA", "Stout"]);

        poll.record_vote("IPA", "alice").expect("vote IPA");
        assert_eq!(poll.vote_of("alice"), Some("IPA"));

        poll.record_vote("Stout", "alice").expect("vote Stout");
        assert_eq!(poll.vote_of("alice"), Some("Stout"));
        assert!(!poll.options[0].votes.contains("alice"));

        let holders = poll
            .options
            .iter()
            .filter(|option| option.votes.contains("alice"))
            .count();
        assert_eq!(holders, 1);
    }

    #[test]
    fn test_record_vote_for_missing_option_leaves_poll_untouched() {
        let mut poll = poll::Poll::new("beer", "best beer?", ["IPA", "Stout"]);
        poll.record_vote("IPA", "alice").expect("vote IPA");
        let before = poll.clone();

        let err = poll.record_vote("Pilsner", "alice").expect_err("missing option");
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(poll, before);
    }

    #[test]
    fn test_add_option_is_idempotent() {
        let mut poll = poll::Poll::new("beer", "best beer?", ["IPA"]);
        assert!(poll.add_option("Stout"));
        assert!(!poll.add_option("Stout"));
        assert!(!poll.add_option("IPA"));
        assert_eq!(poll.options.len(), 2);
    }

    #[test]
    fn test_tally_counts_in_option_order() {
        let mut poll = poll::Poll::new("pizza", "best pizza?", ["Margherita", "Diavola"]);
        poll.record_vote("Diavola", "alice").unwrap();
        poll.record_vote("Diavola", "bob").unwrap();
        poll.record_vote("Margherita", "carol").unwrap();

        let results = poll.tally();
        assert_eq!(results.total, 3);
        assert_eq!(results.options[0].response, "Margherita");
        assert_eq!(results.options[0].votes, 1);
        assert_eq!(results.options[1].votes, 2);
    }

    #[test]
    fn test_create_request_converts_without_votes() {
        let req: poll::CreatePollRequest = serde_json::from_str(
            r#"{"name":"beer","question":"best beer?","options":[{"response":"IPA"},{"response":"Stout"}]}"#,
        )
        .expect("parse request");
        let poll = poll::Poll::from(req);
        assert_eq!(poll.options.len(), 2);
        assert!(poll.options.iter().all(|option| option.votes.is_empty()));
    }

    #[test]
    fn test_credentials_validation_and_redaction() {
        let creds = user::Credentials::new("bob", "hunter2");
        assert!(creds.validate().is_ok());
        assert!(!format!("{:?}", creds).contains("hunter2"));

        assert!(user::Credentials::new("", "pw").validate().is_err());
        assert!(user::Credentials::new("bob", "").validate().is_err());
    }

    #[test]
    fn test_credentials_reject_passwords_bcrypt_would_truncate() {
        let at_limit = "p".repeat(crate::MAX_PASSWORD_BYTES);
        assert!(user::Credentials::new("bob", at_limit.as_str())
            .validate()
            .is_ok());

        let shared_prefix = format!("{}tail", at_limit);
        let err = user::Credentials::new("bob", shared_prefix)
            .validate()
            .expect_err("over-long password");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("at most 72 bytes"));

        // 36 two-byte characters fill the limit exactly; one more overflows.
        let multibyte = "é".repeat(37);
        assert!(user::Credentials::new("bob", multibyte).validate().is_err());
    }
}
