//! Debit, then apply, then render.
//!
//! Paid kinds take credits before the transformation is recorded. If recording fails after the
//! debit went through (typically a concurrent request applied the same kind first), the debit
//! is compensated with a refund keyed on the debit's id. Render failures are only logged: the
//! transformation stays applied and the credits stay spent.

use super::{Transformation, TransformationError, TransformationKind};
use crate::{
    assets::Renderer,
    config::CreditCosts,
    db::models::{credits::CreditTransactionCreateDBRequest, projects::ProjectDBResponse},
    ledger::CreditsLedger,
    metrics,
    projects::ProjectStore,
    types::{ProjectId, UserId, abbrev_uuid},
};
use tracing::{error, info, instrument, warn};

type Result<T> = std::result::Result<T, TransformationError>;

/// Result of applying one transformation
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub project: ProjectDBResponse,
    /// The full list after the apply, in application order
    pub transformations: Vec<Transformation>,
    pub credits_charged: i64,
    /// Balance after the debit; `None` for free transformations
    pub remaining_credits: Option<i64>,
    /// `None` if the render request failed
    pub rendered_url: Option<String>,
}

/// A project's transformation list with the URL that renders it
#[derive(Debug, Clone)]
pub struct TransformationView {
    pub project: ProjectDBResponse,
    pub transformations: Vec<Transformation>,
    pub preview_url: String,
}

pub struct TransformationOrchestrator<'a> {
    ledger: &'a dyn CreditsLedger,
    projects: &'a dyn ProjectStore,
    renderer: &'a dyn Renderer,
    costs: &'a CreditCosts,
}

impl<'a> TransformationOrchestrator<'a> {
    pub fn new(
        ledger: &'a dyn CreditsLedger,
        projects: &'a dyn ProjectStore,
        renderer: &'a dyn Renderer,
        costs: &'a CreditCosts,
    ) -> Self {
        Self {
            ledger,
            projects,
            renderer,
            costs,
        }
    }

    #[instrument(
        skip(self, transformation),
        fields(user_id = %abbrev_uuid(&owner), project_id = %abbrev_uuid(&project_id), kind = %transformation.kind()),
        err
    )]
    pub async fn apply(&self, owner: UserId, project_id: ProjectId, transformation: Transformation) -> Result<ApplyOutcome> {
        let transformation = transformation.normalized()?;
        let kind = transformation.kind();

        let project = self.projects.get(owner, project_id).await?;
        let current = self.projects.transformations(project_id).await?;
        if current.iter().any(|t| t.kind() == kind) {
            return Err(TransformationError::AlreadyApplied(kind));
        }

        let cost = self.costs.cost_of(kind);
        let debit = if cost > 0 {
            let request = CreditTransactionCreateDBRequest::usage(owner, cost, Some(format!("{kind} on project {project_id}")));
            match self.ledger.debit(&request).await {
                Ok(debit) => {
                    metrics::record_credit_debit(kind.as_str(), cost);
                    Some(debit)
                }
                Err(e) => {
                    metrics::record_debit_rejection(e.code());
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let transformations = match self.projects.push_transformation(project_id, &transformation).await {
            Ok(list) => list,
            Err(e) => {
                if let Some(debit) = &debit {
                    let refund = CreditTransactionCreateDBRequest::refund(
                        owner,
                        debit.amount,
                        debit.id,
                        Some(format!("Refund: {kind} could not be applied")),
                    );
                    match self.ledger.credit(&refund).await {
                        Ok(_) => info!(debit_id = %debit.id, "Refunded debit for transformation that was not applied"),
                        Err(refund_err) => {
                            error!(debit_id = %debit.id, "Failed to refund debit for unapplied transformation: {refund_err}")
                        }
                    }
                }
                return Err(e.into());
            }
        };

        let rendered_url = match self.renderer.render(&project, &transformations).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Render failed after transformation was applied: {e}");
                None
            }
        };

        info!(credits_charged = cost, "Applied transformation");

        Ok(ApplyOutcome {
            project,
            transformations,
            credits_charged: cost,
            remaining_credits: debit.map(|d| d.balance_after),
            rendered_url,
        })
    }

    /// Remove one kind. Credits spent on it are not returned.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&owner), project_id = %abbrev_uuid(&project_id)), err)]
    pub async fn remove(&self, owner: UserId, project_id: ProjectId, kind: TransformationKind) -> Result<TransformationView> {
        let project = self.projects.get(owner, project_id).await?;
        if !self.projects.remove_transformation(project_id, kind).await? {
            info!("Transformation was not applied; nothing to remove");
        }
        self.view(project).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&owner), project_id = %abbrev_uuid(&project_id)), err)]
    pub async fn clear(&self, owner: UserId, project_id: ProjectId) -> Result<TransformationView> {
        let project = self.projects.get(owner, project_id).await?;
        let removed = self.projects.clear_transformations(project_id).await?;
        info!(removed, "Cleared transformations");
        self.view(project).await
    }

    pub async fn list(&self, owner: UserId, project_id: ProjectId) -> Result<TransformationView> {
        let project = self.projects.get(owner, project_id).await?;
        self.view(project).await
    }

    async fn view(&self, project: ProjectDBResponse) -> Result<TransformationView> {
        let transformations = self.projects.transformations(project.id).await?;
        let preview_url = self.renderer.preview_url(&project, &transformations);
        Ok(TransformationView {
            project,
            transformations,
            preview_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::RenderError,
        db::models::{credits::CreditTransactionType, projects::ProjectCreateDBRequest, users::UserCreateDBRequest},
        ledger::{InMemoryLedger, LedgerError},
        projects::{InMemoryProjectStore, ProjectPage},
        transformations::render_chain,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct StubRenderer {
        fail: bool,
        renders: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Renderer for StubRenderer {
        fn preview_url(&self, project: &ProjectDBResponse, transformations: &[Transformation]) -> String {
            match render_chain(transformations) {
                Some(chain) => format!("https://cdn.test/{}?tr={chain}", project.file_path),
                None => format!("https://cdn.test/{}", project.file_path),
            }
        }

        async fn render(
            &self,
            project: &ProjectDBResponse,
            transformations: &[Transformation],
        ) -> std::result::Result<String, RenderError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let url = self.preview_url(project, transformations);
            if self.fail {
                return Err(RenderError::Status { url, status: 500 });
            }
            Ok(url)
        }
    }

    /// Lets a competing request apply the same kind between our check and our push
    struct RacingStore {
        inner: InMemoryProjectStore,
    }

    #[async_trait::async_trait]
    impl ProjectStore for RacingStore {
        async fn create(&self, request: &ProjectCreateDBRequest) -> crate::projects::Result<ProjectDBResponse> {
            self.inner.create(request).await
        }

        async fn list(&self, owner: UserId, skip: i64, limit: i64) -> crate::projects::Result<ProjectPage> {
            self.inner.list(owner, skip, limit).await
        }

        async fn get(&self, owner: UserId, id: ProjectId) -> crate::projects::Result<ProjectDBResponse> {
            self.inner.get(owner, id).await
        }

        async fn delete(&self, owner: UserId, id: ProjectId) -> crate::projects::Result<()> {
            self.inner.delete(owner, id).await
        }

        async fn transformations(&self, id: ProjectId) -> crate::projects::Result<Vec<Transformation>> {
            self.inner.transformations(id).await
        }

        async fn push_transformation(
            &self,
            id: ProjectId,
            transformation: &Transformation,
        ) -> crate::projects::Result<Vec<Transformation>> {
            self.inner.push_transformation(id, transformation).await?;
            self.inner.push_transformation(id, transformation).await
        }

        async fn remove_transformation(&self, id: ProjectId, kind: TransformationKind) -> crate::projects::Result<bool> {
            self.inner.remove_transformation(id, kind).await
        }

        async fn clear_transformations(&self, id: ProjectId) -> crate::projects::Result<u64> {
            self.inner.clear_transformations(id).await
        }
    }

    fn open_account(ledger: &InMemoryLedger, credits: i64) -> UserId {
        let id = Uuid::new_v4();
        ledger.open_account(&UserCreateDBRequest {
            id,
            name: "Ada".to_string(),
            email: format!("{id}@example.com"),
            credits,
        });
        id
    }

    async fn create_project(store: &dyn ProjectStore, owner: UserId) -> ProjectDBResponse {
        store
            .create(&ProjectCreateDBRequest {
                user_id: owner,
                name: "Cat".to_string(),
                image_url: "https://cdn.test/cat.png".to_string(),
                image_kit_id: "file_cat".to_string(),
                file_path: "cat.png".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_paid_apply_debits_then_renders() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 10);
        let project = create_project(&store, owner).await;

        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);
        let outcome = orchestrator
            .apply(owner, project.id, Transformation::RemoveBackground)
            .await
            .unwrap();

        assert_eq!(outcome.credits_charged, 2);
        assert_eq!(outcome.remaining_credits, Some(8));
        assert_eq!(outcome.transformations, vec![Transformation::RemoveBackground]);
        assert_eq!(outcome.rendered_url.as_deref(), Some("https://cdn.test/cat.png?tr=e-bgremove"));
        assert_eq!(ledger.balance(owner).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_second_apply_of_same_kind_is_rejected_without_debit() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 10);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        orchestrator
            .apply(owner, project.id, Transformation::RemoveBackground)
            .await
            .unwrap();
        let err = orchestrator
            .apply(owner, project.id, Transformation::RemoveBackground)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransformationError::AlreadyApplied(TransformationKind::RemoveBackground)
        ));
        assert_eq!(ledger.balance(owner).await.unwrap(), 8);
        assert_eq!(store.transformations(project.id).await.unwrap().len(), 1);
        assert_eq!(ledger.list_transactions(owner, 0, 10).await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn test_insufficient_credits_applies_nothing() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 1);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        let err = orchestrator
            .apply(owner, project.id, Transformation::RemoveBackground)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransformationError::Ledger(LedgerError::InsufficientCredits { balance: 1, required: 2 })
        ));
        assert_eq!(ledger.balance(owner).await.unwrap(), 1);
        assert!(store.transformations(project.id).await.unwrap().is_empty());
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_object_crop_is_free_and_normalized() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 0);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        let outcome = orchestrator
            .apply(
                owner,
                project.id,
                Transformation::ObjectCrop {
                    label: "  Dog ".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.credits_charged, 0);
        assert_eq!(outcome.remaining_credits, None);
        assert_eq!(outcome.transformations, vec![Transformation::ObjectCrop { label: "dog".to_string() }]);
        assert_eq!(outcome.rendered_url.as_deref(), Some("https://cdn.test/cat.png?tr=fo-dog,ar-1-1"));
        assert_eq!(ledger.list_transactions(owner, 0, 10).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn test_empty_label_fails_before_any_mutation() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 5);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        for label in ["", "   ", "\t\n"] {
            let err = orchestrator
                .apply(
                    owner,
                    project.id,
                    Transformation::ObjectCrop {
                        label: label.to_string(),
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, TransformationError::EmptyInput));
        }

        assert!(store.transformations(project.id).await.unwrap().is_empty());
        assert_eq!(ledger.balance(owner).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_debit_and_transformation() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer {
            fail: true,
            ..Default::default()
        };
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 3);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        let outcome = orchestrator.apply(owner, project.id, Transformation::Upscale).await.unwrap();

        assert_eq!(outcome.rendered_url, None);
        assert_eq!(outcome.remaining_credits, Some(2));
        assert_eq!(store.transformations(project.id).await.unwrap(), vec![Transformation::Upscale]);
        assert_eq!(ledger.balance(owner).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lost_race_refunds_the_debit() {
        let ledger = InMemoryLedger::new();
        let store = RacingStore {
            inner: InMemoryProjectStore::new(),
        };
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 4);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        let err = orchestrator
            .apply(owner, project.id, Transformation::RemoveBackground)
            .await
            .unwrap_err();

        assert!(matches!(err, TransformationError::AlreadyApplied(_)));
        assert_eq!(ledger.balance(owner).await.unwrap(), 4);

        let page = ledger.list_transactions(owner, 0, 10).await.unwrap();
        assert_eq!(page.total_count, 2);
        let refund = &page.transactions[0];
        let debit = &page.transactions[1];
        assert_eq!(refund.transaction_type, CreditTransactionType::Refund);
        assert_eq!(debit.transaction_type, CreditTransactionType::Usage);
        assert_eq!(refund.source_id, format!("refund:{}", debit.id));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_touch_transformations() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 5);
        let intruder = open_account(&ledger, 5);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        let err = orchestrator
            .apply(intruder, project.id, Transformation::Upscale)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformationError::NotFoundOrForbidden));
        assert_eq!(ledger.balance(intruder).await.unwrap(), 5);

        assert!(matches!(
            orchestrator.clear(intruder, project.id).await,
            Err(TransformationError::NotFoundOrForbidden)
        ));
    }

    #[tokio::test]
    async fn test_remove_clear_and_list() {
        let ledger = InMemoryLedger::new();
        let store = InMemoryProjectStore::new();
        let renderer = StubRenderer::default();
        let costs = CreditCosts::default();
        let owner = open_account(&ledger, 5);
        let project = create_project(&store, owner).await;
        let orchestrator = TransformationOrchestrator::new(&ledger, &store, &renderer, &costs);

        orchestrator.apply(owner, project.id, Transformation::Upscale).await.unwrap();
        orchestrator
            .apply(owner, project.id, Transformation::object_crop("cat").unwrap())
            .await
            .unwrap();

        let view = orchestrator.list(owner, project.id).await.unwrap();
        assert_eq!(view.preview_url, "https://cdn.test/cat.png?tr=e-upscale:fo-cat,ar-1-1");

        let view = orchestrator
            .remove(owner, project.id, TransformationKind::Upscale)
            .await
            .unwrap();
        assert_eq!(view.transformations, vec![Transformation::ObjectCrop { label: "cat".to_string() }]);

        // Removing an absent kind is a no-op
        let view = orchestrator
            .remove(owner, project.id, TransformationKind::Upscale)
            .await
            .unwrap();
        assert_eq!(view.transformations.len(), 1);

        let view = orchestrator.clear(owner, project.id).await.unwrap();
        assert!(view.transformations.is_empty());
        assert_eq!(view.preview_url, "https://cdn.test/cat.png");

        // No refund on removal
        assert_eq!(ledger.balance(owner).await.unwrap(), 4);
    }
}
