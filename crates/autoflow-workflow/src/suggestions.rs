//! Quick-win suggestions and notification preferences

use autoflow_core::{
    MuteRule, NotificationPrefs, Result, RuleId, SuggestionId, SuggestionSummary,
};
use autoflow_infra::Idempotency;
use parking_lot::RwLock;
use tracing::{info, instrument};

use crate::context::ServiceContext;
use crate::notify::Notice;

/// Accept, reject and mute suggestions; manage the weekly digest opt-in
pub struct SuggestionCenter {
    ctx: ServiceContext,
    /// Last known preferences, shown while a write is in flight
    prefs: RwLock<Option<NotificationPrefs>>,
}

impl SuggestionCenter {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            prefs: RwLock::new(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<SuggestionSummary> {
        let summary = self
            .ctx
            .call("load_suggestions", Idempotency::Idempotent, || {
                self.ctx.backend().suggestion_summary()
            })
            .await?;

        *self.prefs.write() = Some(summary.prefs);
        Ok(summary)
    }

    /// Turn a suggestion into a pending approval
    #[instrument(skip(self), fields(suggestion_id = %id))]
    pub async fn accept(&self, id: &SuggestionId) -> Result<()> {
        self.ctx
            .call("accept_suggestion", Idempotency::Command, || {
                self.ctx.backend().accept_suggestion(id)
            })
            .await?;

        info!(suggestion_id = %id, "Suggestion accepted");
        self.ctx.notify(Notice::success(
            "Suggestion accepted, a draft is waiting in approvals",
        ));
        Ok(())
    }

    #[instrument(skip(self), fields(suggestion_id = %id))]
    pub async fn reject(&self, id: &SuggestionId) -> Result<()> {
        self.ctx
            .call("reject_suggestion", Idempotency::Command, || {
                self.ctx.backend().reject_suggestion(id)
            })
            .await?;

        self.ctx.notify(Notice::success("Suggestion dismissed"));
        Ok(())
    }

    /// Stop surfacing suggestions of `suggestion_type`, for one rule or all
    #[instrument(skip(self))]
    pub async fn mute(&self, suggestion_type: &str, rule_id: Option<RuleId>) -> Result<()> {
        let rule = match MuteRule::new(suggestion_type, rule_id) {
            Ok(rule) => rule,
            Err(err) => return self.ctx.reject_locally("mute_suggestions", err),
        };

        self.ctx
            .call("mute_suggestions", Idempotency::Command, || {
                self.ctx.backend().mute_suggestions(rule.clone())
            })
            .await?;

        self.ctx.notify(Notice::success(format!(
            "Muted '{}' suggestions",
            rule.suggestion_type
        )));
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn prefs(&self) -> Result<NotificationPrefs> {
        let prefs = self
            .ctx
            .call("load_preferences", Idempotency::Idempotent, || {
                self.ctx.backend().notification_prefs()
            })
            .await?;

        *self.prefs.write() = Some(prefs);
        Ok(prefs)
    }

    /// Preferences as currently shown
    pub fn cached_prefs(&self) -> Option<NotificationPrefs> {
        *self.prefs.read()
    }

    /// Optimistically flip the weekly digest opt-in; the previous value is
    /// restored when the write fails
    #[instrument(skip(self))]
    pub async fn set_weekly_digest(&self, enabled: bool) -> Result<NotificationPrefs> {
        let desired = NotificationPrefs {
            weekly_digest_opt_in: enabled,
        };
        let previous = self.prefs.write().replace(desired);

        match self
            .ctx
            .call("save_preferences", Idempotency::Idempotent, || {
                self.ctx.backend().set_notification_prefs(desired)
            })
            .await
        {
            Ok(saved) => {
                *self.prefs.write() = Some(saved);
                self.ctx.notify(Notice::success(if saved.weekly_digest_opt_in {
                    "Weekly digest enabled"
                } else {
                    "Weekly digest disabled"
                }));
                Ok(saved)
            }
            Err(err) => {
                *self.prefs.write() = previous;
                Err(err)
            }
        }
    }
}
