//! Interactive annotation
//!
//! The overlay injected by [`annotator_script`] owns the in-page UI and pushes
//! each transition over a CDP binding. [`AnnotationSession`] folds that event
//! stream through the host-side state machine, which is the single source of
//! truth for what the user selected.
//!
//! ```text
//! Idle -> WelcomeShown -> AwaitingSelection <-> CategoryMenuOpen
//!                                 |
//!                                 +-- Done (>= 1 selection) --> Finished
//! ```

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::browser::PageDriver;
use crate::model::{Category, ExtractedElement};
use crate::page_extractor::js_scripts::{annotator_script, publish_selections_script};
use crate::page_extractor::snapshot::ElementSnapshot;
use crate::utils::constants::ANNOTATION_BINDING;
use crate::utils::errors::{ScrapeError, ScrapeResult};

/// One transition reported by the in-page overlay
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnnotationEvent {
    WelcomeShown,
    WelcomeDismissed,
    ElementPicked { snapshot: ElementSnapshot },
    CategoryChosen { category: Category, snapshot: ElementSnapshot },
    Ignored,
    DoneRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationState {
    Idle,
    WelcomeShown,
    AwaitingSelection,
    CategoryMenuOpen,
    Finished,
}

/// Why an event did not change the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Picked image had neither `src` nor `data-src`
    ImageWithoutSource,
    /// Done pressed before anything was accepted
    NothingSelected,
    /// Event not valid in the current state
    OutOfOrder(AnnotationState),
}

/// Result of folding one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved(AnnotationState),
    Accepted(ExtractedElement),
    Rejected(Rejection),
    Finished,
}

/// Host-side accumulator for one annotation session
pub struct AnnotationSession {
    state: AnnotationState,
    selections: Vec<ExtractedElement>,
    live: Option<broadcast::Sender<Vec<ExtractedElement>>>,
}

impl AnnotationSession {
    pub fn new(live: Option<broadcast::Sender<Vec<ExtractedElement>>>) -> Self {
        Self {
            state: AnnotationState::Idle,
            selections: Vec::new(),
            live,
        }
    }

    pub fn state(&self) -> AnnotationState {
        self.state
    }

    pub fn selections(&self) -> &[ExtractedElement] {
        &self.selections
    }

    pub fn is_finished(&self) -> bool {
        self.state == AnnotationState::Finished
    }

    pub fn into_selections(self) -> Vec<ExtractedElement> {
        self.selections
    }

    fn publish(&self) {
        if let Some(live) = &self.live {
            // No subscribers is fine; the list is also returned at the end
            let _ = live.send(self.selections.clone());
        }
    }

    fn move_to(&mut self, state: AnnotationState) -> Step {
        self.state = state;
        Step::Moved(state)
    }

    pub fn apply(&mut self, event: AnnotationEvent) -> Step {
        use AnnotationState as S;

        match (self.state, event) {
            (S::Idle, AnnotationEvent::WelcomeShown) => self.move_to(S::WelcomeShown),
            (S::WelcomeShown, AnnotationEvent::WelcomeDismissed) => self.move_to(S::AwaitingSelection),
            (S::AwaitingSelection, AnnotationEvent::ElementPicked { snapshot }) => {
                debug!("Element picked: {}", snapshot.locator());
                self.move_to(S::CategoryMenuOpen)
            }
            (S::CategoryMenuOpen, AnnotationEvent::Ignored) => self.move_to(S::AwaitingSelection),
            (S::CategoryMenuOpen, AnnotationEvent::CategoryChosen { category, snapshot }) => {
                self.state = S::AwaitingSelection;
                let Some(value) = snapshot.annotation_value() else {
                    warn!("Skipping image with no source: {}", snapshot.locator());
                    return Step::Rejected(Rejection::ImageWithoutSource);
                };
                let element = ExtractedElement::new(category, Some(snapshot.locator()), value);
                self.selections.push(element.clone());
                info!(
                    "Accepted {} selection {} ({} total)",
                    category,
                    snapshot.locator(),
                    self.selections.len()
                );
                self.publish();
                Step::Accepted(element)
            }
            (S::AwaitingSelection, AnnotationEvent::DoneRequested) => {
                if self.selections.is_empty() {
                    warn!("Done pressed with no elements selected");
                    return Step::Rejected(Rejection::NothingSelected);
                }
                self.state = S::Finished;
                Step::Finished
            }
            (state, event) => {
                debug!("Ignoring {:?} in state {:?}", event, state);
                Step::Rejected(Rejection::OutOfOrder(state))
            }
        }
    }
}

/// Inject the overlay and block until the user presses Done
///
/// After every accepted selection the full list is also posted inside the
/// page as a `scraper-data` message. Waits without a time bound. Fails with
/// [`ScrapeError::AnnotationAborted`] when the page goes away first.
pub async fn run_annotation(
    page: &dyn PageDriver,
    live: Option<broadcast::Sender<Vec<ExtractedElement>>>,
) -> ScrapeResult<Vec<ExtractedElement>> {
    // The binding must exist before the overlay emits its first event
    let mut events = page.open_channel(ANNOTATION_BINDING).await?;

    let installed = page.evaluate(&annotator_script(ANNOTATION_BINDING)).await?;
    if installed == serde_json::Value::Bool(false) {
        warn!("Annotation overlay already present on page");
    }
    info!("Annotation overlay injected, waiting for user selections");

    let mut session = AnnotationSession::new(live);
    while let Some(payload) = events.recv().await {
        let event = match serde_json::from_str::<AnnotationEvent>(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Discarding malformed annotation event: {}", e);
                continue;
            }
        };

        match session.apply(event) {
            Step::Finished => {
                info!(
                    "Annotation finished with {} selections",
                    session.selections().len()
                );
                return Ok(session.into_selections());
            }
            Step::Accepted(_) => {
                let script = publish_selections_script(session.selections());
                if let Err(e) = page.evaluate(&script).await {
                    warn!("Failed to post selections to the page: {}", e);
                }
            }
            _ => {}
        }
    }

    warn!(
        "Annotation channel closed in state {:?} with {} selections",
        session.state(),
        session.selections().len()
    );
    Err(ScrapeError::AnnotationAborted)
}
