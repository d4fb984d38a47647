//! Optional child state: `if_let` scoping and presentation
//!
//! [`Presented`] is an explicit wrapper over optional child state: setting it
//! presents the child, clearing it dismisses the child, and dismissal (by
//! either the parent reducer or an intercepted
//! [`PresentationAction::Dismiss`]) cancels every effect scoped under the
//! presentation tag. No effect outlives the state that spawned it.

use std::fmt;

use crate::action::Action;
use crate::cancel::CancelId;
use crate::effect::Effect;
use crate::reducer::{CasePath, Reducer};

/// Optional child state whose presence drives show/dismiss behavior and
/// effect lifetime.
pub struct Presented<T> {
    state: Option<T>,
}

impl<T> Presented<T> {
    /// Nothing presented.
    pub fn none() -> Self {
        Self { state: None }
    }

    /// Present a child.
    pub fn present(&mut self, child: T) {
        self.state = Some(child);
    }

    /// Dismiss the child, if any. The scoping combinator observing this slot
    /// cancels the child's effects on the same dispatch.
    pub fn dismiss(&mut self) {
        self.state = None;
    }

    pub fn is_presented(&self) -> bool {
        self.state.is_some()
    }

    pub fn as_ref(&self) -> Option<&T> {
        self.state.as_ref()
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        self.state.as_mut()
    }
}

impl<T> Default for Presented<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<Option<T>> for Presented<T> {
    fn from(state: Option<T>) -> Self {
        Self { state }
    }
}

impl<T: fmt::Debug> fmt::Debug for Presented<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(t) => f.debug_tuple("Presented").field(t).finish(),
            None => f.write_str("Presented(None)"),
        }
    }
}

/// Wraps a child action, distinguishing it from the dismiss signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentationAction<CA> {
    /// An action for the presented child.
    Presented(CA),
    /// Dismiss the child. The combinator clears the slot and cancels the
    /// child's effects; the parent still sees the action for bookkeeping.
    Dismiss,
}

/// Runs a child reducer against optional sub-state while it is present.
/// Built with [`ReducerExt::if_let`](crate::reducer::ReducerExt::if_let).
pub struct IfLet<P, C>
where
    P: Reducer,
    C: Reducer,
{
    parent: P,
    tag: &'static str,
    state: fn(&mut P::State) -> &mut Option<C::State>,
    case: CasePath<P::Action, C::Action>,
    child: C,
}

impl<P, C> IfLet<P, C>
where
    P: Reducer,
    C: Reducer,
{
    pub(crate) fn new(
        parent: P,
        tag: &'static str,
        state: fn(&mut P::State) -> &mut Option<C::State>,
        case: CasePath<P::Action, C::Action>,
        child: C,
    ) -> Self {
        Self {
            parent,
            tag,
            state,
            case,
            child,
        }
    }
}

impl<P, C> Reducer for IfLet<P, C>
where
    P: Reducer,
    C: Reducer,
{
    type State = P::State;
    type Action = P::Action;

    fn reduce(&self, state: &mut P::State, action: P::Action) -> Effect<P::Action> {
        let mut effects = Vec::new();
        let was_present = (self.state)(state).is_some();

        // Child before parent, so the parent observes the child's updates.
        if let Ok(child_action) = (self.case.extract)(action.clone()) {
            match (self.state)(state).as_mut() {
                Some(child_state) => {
                    let embed = self.case.embed;
                    effects.push(
                        self.child
                            .reduce(child_state, child_action)
                            .map(embed)
                            .scoped(self.tag),
                    );
                }
                None => {
                    tracing::debug!(
                        tag = self.tag,
                        action = action.name(),
                        "dropping child action for absent state"
                    );
                }
            }
        }

        let parent_effect = self.parent.reduce(state, action);
        let now_present = (self.state)(state).is_some();
        effects.push(parent_effect);
        if was_present && !now_present {
            effects.push(Effect::cancel_scope(CancelId::new(self.tag)));
        }

        Effect::merge(effects)
    }
}

/// Presentation variant of [`IfLet`] over a [`Presented`] slot. Built with
/// [`ReducerExt::present`](crate::reducer::ReducerExt::present).
pub struct Present<P, C>
where
    P: Reducer,
    C: Reducer,
{
    parent: P,
    tag: &'static str,
    state: fn(&mut P::State) -> &mut Presented<C::State>,
    case: CasePath<P::Action, PresentationAction<C::Action>>,
    child: C,
}

impl<P, C> Present<P, C>
where
    P: Reducer,
    C: Reducer,
{
    pub(crate) fn new(
        parent: P,
        tag: &'static str,
        state: fn(&mut P::State) -> &mut Presented<C::State>,
        case: CasePath<P::Action, PresentationAction<C::Action>>,
        child: C,
    ) -> Self {
        Self {
            parent,
            tag,
            state,
            case,
            child,
        }
    }
}

impl<P, C> Reducer for Present<P, C>
where
    P: Reducer,
    C: Reducer,
{
    type State = P::State;
    type Action = P::Action;

    fn reduce(&self, state: &mut P::State, action: P::Action) -> Effect<P::Action> {
        let mut effects = Vec::new();
        let was_present = (self.state)(state).is_presented();

        if let Ok(presentation) = (self.case.extract)(action.clone()) {
            match presentation {
                PresentationAction::Presented(child_action) => {
                    match (self.state)(state).as_mut() {
                        Some(child_state) => {
                            let embed = self.case.embed;
                            effects.push(
                                self.child
                                    .reduce(child_state, child_action)
                                    .map(move |ca| embed(PresentationAction::Presented(ca)))
                                    .scoped(self.tag),
                            );
                        }
                        None => {
                            tracing::debug!(
                                tag = self.tag,
                                action = action.name(),
                                "dropping child action for dismissed state"
                            );
                        }
                    }
                }
                PresentationAction::Dismiss => {
                    (self.state)(state).dismiss();
                }
            }
        }

        let parent_effect = self.parent.reduce(state, action);
        let now_present = (self.state)(state).is_presented();
        effects.push(parent_effect);
        if was_present && !now_present {
            effects.push(Effect::cancel_scope(CancelId::new(self.tag)));
        }

        Effect::merge(effects)
    }
}
