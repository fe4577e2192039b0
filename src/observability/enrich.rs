//! Request id enrichment for outgoing records.

use crate::context;

/// Field under which every record carries the request id. Downstream log
/// consumers key on this name.
pub const REQUEST_ID_FIELD: &str = "requestID";

/// Written in place of the id when the calling thread's slot cannot be read.
pub const UNAVAILABLE_PLACEHOLDER: &str = "<request context unavailable>";

/// What the calling flow contributes to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stamp {
    /// `None` renders as `null`.
    pub request_id: Option<String>,
    /// Client attributes captured at the request boundary, e.g. `X-Client`.
    pub attributes: Vec<(String, String)>,
}

/// The values to stamp on a record emitted right now by the calling flow.
///
/// Never fails.
pub fn stamp() -> Stamp {
    match context::try_current() {
        Ok(None) => Stamp::default(),
        Ok(Some(id)) => Stamp {
            request_id: Some(id.to_string()),
            attributes: id
                .attributes()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
        },
        Err(_) => Stamp {
            request_id: Some(UNAVAILABLE_PLACEHOLDER.to_string()),
            attributes: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestId;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_stamp_reflects_calling_flow() {
        assert_eq!(stamp(), Stamp::default());
        context::scope("abc", || {
            assert_eq!(stamp().request_id.as_deref(), Some("abc"));
        });
        assert_eq!(stamp().request_id, None);
    }

    #[test]
    fn test_stamp_carries_client_attributes() {
        let id = RequestId::from("abc").with_attribute("X-Client", "gdm-desktop");
        let stamped = context::scope(id, stamp);
        assert_eq!(
            stamped.attributes,
            [("X-Client".to_string(), "gdm-desktop".to_string())]
        );
    }

    struct StampOnDrop(mpsc::Sender<Stamp>);

    impl Drop for StampOnDrop {
        fn drop(&mut self) {
            let _ = self.0.send(stamp());
        }
    }

    thread_local! {
        static LATE: RefCell<Option<StampOnDrop>> = const { RefCell::new(None) };
    }

    #[test]
    fn test_stamp_during_thread_teardown_uses_placeholder() {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            // Registered first, so destroyed after the context slot.
            LATE.with(|late| *late.borrow_mut() = Some(StampOnDrop(tx)));
            context::scope("short-lived", || ());
        })
        .join()
        .unwrap();

        let stamped = rx.recv().unwrap();
        assert_eq!(stamped.request_id.as_deref(), Some(UNAVAILABLE_PLACEHOLDER));
    }
}
