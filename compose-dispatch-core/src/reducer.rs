//! Reducers and composition
//!
//! A reducer is a pure transition function `(State, Action) -> Effect`.
//! Reducer values are stateless: instances are parameterized by capability
//! clients or closures, but encode no mutable data. Parent reducers are built
//! out of child reducers with the combinators in this module and in
//! [`identified`](crate::identified), [`stack`](crate::stack), and
//! [`presentation`](crate::presentation).
//!
//! Dynamic keypaths are replaced by explicit accessor pairs: state lenses are
//! plain `fn(&mut Parent) -> &mut Child` pointers, and action case paths are
//! [`CasePath`] values built from two `fn` pointers.

use std::marker::PhantomData;

use crate::action::Action;
use crate::effect::Effect;
use crate::identified::{ForEach, Identifiable, IdentifiedVec};
use crate::presentation::{IfLet, Present, Presented, PresentationAction};
use crate::stack::{ForEachStack, StackElementId, StackState};

/// A pure state-transition function composed from smaller reducers.
pub trait Reducer: Send + Sync + 'static {
    /// The state this reducer owns for the duration of a call.
    type State: Send + 'static;
    /// The actions this reducer understands.
    type Action: Action;

    /// Apply `action` to `state`, returning the side effects to run.
    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Effect<Self::Action>;
}

/// An action case path: a prism into one case of a parent action enum.
///
/// `extract` returns the child action when the parent action matches, or
/// gives the original action back so non-matching actions pass through
/// untouched. `embed` wraps a child action for the trip back up.
///
/// ```ignore
/// let case = CasePath::new(
///     |a| match a {
///         AppAction::Counter(c) => Ok(c),
///         other => Err(other),
///     },
///     AppAction::Counter,
/// );
/// ```
pub struct CasePath<A, ChildA> {
    /// Try to pull the child action out of a parent action.
    pub extract: fn(A) -> Result<ChildA, A>,
    /// Wrap a child action back into the parent's space.
    pub embed: fn(ChildA) -> A,
}

impl<A, ChildA> CasePath<A, ChildA> {
    /// Build a case path from an extract/embed pair.
    pub fn new(extract: fn(A) -> Result<ChildA, A>, embed: fn(ChildA) -> A) -> Self {
        Self { extract, embed }
    }
}

impl<A, ChildA> Clone for CasePath<A, ChildA> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, ChildA> Copy for CasePath<A, ChildA> {}

/// Wrap a closure as a [`Reducer`].
///
/// This is the leaf of every feature: a `match` over the action enum.
pub struct Reduce<S, A, F> {
    f: F,
    _marker: PhantomData<fn(&mut S, A)>,
}

impl<S, A, F> Reduce<S, A, F>
where
    S: Send + 'static,
    A: Action,
    F: Fn(&mut S, A) -> Effect<A> + Send + Sync + 'static,
{
    /// Create a reducer from a transition closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<S, A, F> Reducer for Reduce<S, A, F>
where
    S: Send + 'static,
    A: Action,
    F: Fn(&mut S, A) -> Effect<A> + Send + Sync + 'static,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut S, action: A) -> Effect<A> {
        (self.f)(state, action)
    }
}

/// A reducer that does nothing. Useful as the base of a body that is all
/// combinators, e.g. `NoopReducer::new().for_each(...)`.
pub struct NoopReducer<S, A> {
    _marker: PhantomData<fn(&mut S, A)>,
}

impl<S, A> NoopReducer<S, A> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S, A> Default for NoopReducer<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> Reducer for NoopReducer<S, A>
where
    S: Send + 'static,
    A: Action,
{
    type State = S;
    type Action = A;

    fn reduce(&self, _state: &mut S, _action: A) -> Effect<A> {
        Effect::none()
    }
}

/// Lift a child reducer to run against a guaranteed-present sub-state and a
/// matching action case. Actions that don't match the case pass through
/// untouched (the other reducers in a tuple body see them).
///
/// `tag` namespaces the child's cancellation identities, so two scopes of
/// the same child feature never cancel each other's effects.
pub struct Scope<C: Reducer, S, A> {
    tag: &'static str,
    state: fn(&mut S) -> &mut C::State,
    case: CasePath<A, C::Action>,
    child: C,
}

impl<C: Reducer, S, A> Scope<C, S, A> {
    pub fn new(
        tag: &'static str,
        state: fn(&mut S) -> &mut C::State,
        case: CasePath<A, C::Action>,
        child: C,
    ) -> Self {
        Self {
            tag,
            state,
            case,
            child,
        }
    }
}

impl<C, S, A> Reducer for Scope<C, S, A>
where
    C: Reducer,
    S: Send + 'static,
    A: Action,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut S, action: A) -> Effect<A> {
        match (self.case.extract)(action) {
            Ok(child_action) => {
                let child_state = (self.state)(state);
                let embed = self.case.embed;
                self.child
                    .reduce(child_state, child_action)
                    .map(embed)
                    .scoped(self.tag)
            }
            Err(_) => Effect::none(),
        }
    }
}

// Reducer bodies are tuples run in sequence, first to last, with the
// effects merged. Mirrors listing several reducers in one feature body.
impl<R1, R2> Reducer for (R1, R2)
where
    R1: Reducer,
    R2: Reducer<State = R1::State, Action = R1::Action>,
{
    type State = R1::State;
    type Action = R1::Action;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Effect<Self::Action> {
        let first = self.0.reduce(state, action.clone());
        let second = self.1.reduce(state, action);
        Effect::merge([first, second])
    }
}

impl<R1, R2, R3> Reducer for (R1, R2, R3)
where
    R1: Reducer,
    R2: Reducer<State = R1::State, Action = R1::Action>,
    R3: Reducer<State = R1::State, Action = R1::Action>,
{
    type State = R1::State;
    type Action = R1::Action;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Effect<Self::Action> {
        let first = self.0.reduce(state, action.clone());
        let second = self.1.reduce(state, action.clone());
        let third = self.2.reduce(state, action);
        Effect::merge([first, second, third])
    }
}

/// Builder methods that attach child features to a parent reducer.
///
/// Each combinator runs the child before the parent for matching actions and
/// cancels the child's effects when the state it was attached to goes away.
pub trait ReducerExt: Reducer + Sized {
    /// Run `child` against optional sub-state while it is present.
    ///
    /// A child action arriving while the state is absent is dropped. When
    /// the optional transitions to `None`, every effect registered under
    /// `tag` is cancelled.
    fn if_let<C>(
        self,
        tag: &'static str,
        state: fn(&mut Self::State) -> &mut Option<C::State>,
        case: CasePath<Self::Action, C::Action>,
        child: C,
    ) -> IfLet<Self, C>
    where
        C: Reducer,
    {
        IfLet::new(self, tag, state, case, child)
    }

    /// Presentation variant of [`if_let`](Self::if_let) over a
    /// [`Presented`] slot: additionally intercepts
    /// [`PresentationAction::Dismiss`], clearing the slot and cancelling the
    /// child's effects.
    fn present<C>(
        self,
        tag: &'static str,
        state: fn(&mut Self::State) -> &mut Presented<C::State>,
        case: CasePath<Self::Action, PresentationAction<C::Action>>,
        child: C,
    ) -> Present<Self, C>
    where
        C: Reducer,
    {
        Present::new(self, tag, state, case, child)
    }

    /// Route `(id, child_action)` pairs to elements of an identified
    /// collection. Actions for a missing id are dropped; removing an element
    /// cancels every effect scoped under its id.
    fn for_each<C>(
        self,
        tag: &'static str,
        state: fn(&mut Self::State) -> &mut IdentifiedVec<C::State>,
        case: CasePath<Self::Action, (<C::State as Identifiable>::Id, C::Action)>,
        child: C,
    ) -> ForEach<Self, C>
    where
        C: Reducer,
        C::State: Identifiable,
        <C::State as Identifiable>::Id: std::fmt::Display,
    {
        ForEach::new(self, tag, state, case, child)
    }

    /// Route `(StackElementId, child_action)` pairs to a [`StackState`].
    /// Popped elements' effects are cancelled most-recent-first.
    fn for_each_stack<C>(
        self,
        tag: &'static str,
        state: fn(&mut Self::State) -> &mut StackState<C::State>,
        case: CasePath<Self::Action, (StackElementId, C::Action)>,
        child: C,
    ) -> ForEachStack<Self, C>
    where
        C: Reducer,
    {
        ForEachStack::new(self, tag, state, case, child)
    }
}

impl<R: Reducer> ReducerExt for R {}
