//! Outbound delivery of approved replies

use async_trait::async_trait;
use autoflow_core::{Approval, ApprovalId, AutomationError, Result};
use parking_lot::Mutex;
use tracing::info;

/// Posts a reply to the platform the interaction came from
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver `approval.effective_response()`. Failures are reported as
    /// `AutomationError::Delivery`.
    async fn deliver(&self, approval: &Approval) -> Result<()>;
}

/// Accepts every reply and only logs it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    async fn deliver(&self, approval: &Approval) -> Result<()> {
        info!(
            approval_id = %approval.id,
            platform = %approval.platform,
            chars = approval.effective_response().len(),
            "Reply delivered"
        );
        Ok(())
    }
}

/// A reply handed to [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub approval_id: ApprovalId,
    pub text: String,
}

/// Keeps every delivered reply; can be switched into a failing mode
#[derive(Debug, Default)]
pub struct RecordingChannel {
    delivered: Mutex<Vec<Delivered>>,
    failure: Mutex<Option<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery with `reason` until [`RecordingChannel::recover`]
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn deliver(&self, approval: &Approval) -> Result<()> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(AutomationError::Delivery(reason));
        }
        self.delivered.lock().push(Delivered {
            approval_id: approval.id.clone(),
            text: approval.effective_response().to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::{InteractionType, NewApproval, Platform};
    use chrono::Utc;

    fn approval() -> Approval {
        let draft = NewApproval::new(Platform::Tiktok, InteractionType::Comment, "love it", "thank you!");
        Approval::from_draft(ApprovalId::new("ap-1"), draft, Utc::now()).unwrap()
    }

    #[test]
    fn test_log_channel_accepts() {
        assert!(tokio_test::block_on(LogChannel.deliver(&approval())).is_ok());
    }

    #[test]
    fn test_recording_channel_modes() {
        let channel = RecordingChannel::new();
        let approval = approval();

        tokio_test::block_on(channel.deliver(&approval)).unwrap();
        channel.fail_with("rate limited");
        let err = tokio_test::block_on(channel.deliver(&approval)).unwrap_err();
        assert!(matches!(err, AutomationError::Delivery(ref m) if m == "rate limited"));

        assert_eq!(
            channel.delivered(),
            vec![Delivered {
                approval_id: ApprovalId::new("ap-1"),
                text: "thank you!".to_string(),
            }]
        );
    }
}
