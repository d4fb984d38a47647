//! Navigation stacks with store-assigned element identity
//!
//! Stack identity is independent of domain identity: pushing two screens of
//! the same logical type yields two distinct [`StackElementId`]s, so each is
//! individually addressable and poppable. Ids are monotonically increasing
//! and never reused within a stack's lifetime, which keeps `pop_to`
//! unambiguous even while new pushes are racing in.

use std::fmt;

use crate::action::Action;
use crate::cancel::CancelId;
use crate::effect::Effect;
use crate::reducer::{CasePath, Reducer};

/// Identity of one element in a [`StackState`], assigned at push time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StackElementId(u64);

impl fmt::Display for StackElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered stack of feature states, bottom first.
pub struct StackState<T> {
    next_id: u64,
    elements: Vec<(StackElementId, T)>,
}

impl<T> StackState<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            elements: Vec::new(),
        }
    }

    /// Push an element, returning its freshly assigned id.
    pub fn push(&mut self, element: T) -> StackElementId {
        let id = StackElementId(self.next_id);
        self.next_id += 1;
        self.elements.push((id, element));
        id
    }

    pub fn get(&self, id: StackElementId) -> Option<&T> {
        self.elements
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, id: StackElementId) -> Option<&mut T> {
        self.elements
            .iter_mut()
            .find(|(eid, _)| *eid == id)
            .map(|(_, e)| e)
    }

    /// Remove the element with `id` and everything pushed after it.
    ///
    /// Returns the removed elements most-recent-first. Unknown ids are a
    /// no-op returning nothing.
    pub fn pop_to(&mut self, id: StackElementId) -> Vec<(StackElementId, T)> {
        match self.elements.iter().position(|(eid, _)| *eid == id) {
            Some(i) => {
                let mut removed: Vec<_> = self.elements.drain(i..).collect();
                removed.reverse();
                removed
            }
            None => {
                tracing::debug!(id = %id, "pop_to unknown stack id ignored");
                Vec::new()
            }
        }
    }

    /// Remove every element.
    pub fn remove_all(&mut self) {
        self.elements.clear();
    }

    /// Element ids bottom-first.
    pub fn ids(&self) -> impl Iterator<Item = StackElementId> + '_ {
        self.elements.iter().map(|(id, _)| *id)
    }

    /// `(id, element)` pairs bottom-first.
    pub fn iter(&self) -> impl Iterator<Item = (StackElementId, &T)> {
        self.elements.iter().map(|(id, e)| (*id, e))
    }

    /// The most recently pushed element.
    pub fn top(&self) -> Option<(StackElementId, &T)> {
        self.elements.last().map(|(id, e)| (*id, e))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> Default for StackState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for StackState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.elements.iter().map(|(id, e)| (id, e)))
            .finish()
    }
}

/// Routes `(StackElementId, child_action)` pairs to stack elements. Built
/// with [`ReducerExt::for_each_stack`](crate::reducer::ReducerExt::for_each_stack).
///
/// When elements leave the stack (pop, remove_all), their effects are
/// cancelled most-recent-first, so nothing from a popped screen can mutate
/// the state of a screen that stays.
pub struct ForEachStack<P, C>
where
    P: Reducer,
    C: Reducer,
{
    parent: P,
    tag: &'static str,
    state: fn(&mut P::State) -> &mut StackState<C::State>,
    case: CasePath<P::Action, (StackElementId, C::Action)>,
    child: C,
}

impl<P, C> ForEachStack<P, C>
where
    P: Reducer,
    C: Reducer,
{
    pub(crate) fn new(
        parent: P,
        tag: &'static str,
        state: fn(&mut P::State) -> &mut StackState<C::State>,
        case: CasePath<P::Action, (StackElementId, C::Action)>,
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

impl<P, C> Reducer for ForEachStack<P, C>
where
    P: Reducer,
    C: Reducer,
{
    type State = P::State;
    type Action = P::Action;

    fn reduce(&self, state: &mut P::State, action: P::Action) -> Effect<P::Action> {
        let mut effects = Vec::new();

        if let Ok((id, child_action)) = (self.case.extract)(action.clone()) {
            match (self.state)(state).get_mut(id) {
                Some(element) => {
                    let embed = self.case.embed;
                    effects.push(
                        self.child
                            .reduce(element, child_action)
                            .map(move |ca| embed((id, ca)))
                            .scoped(&id.to_string())
                            .scoped(self.tag),
                    );
                }
                None => {
                    tracing::debug!(
                        tag = self.tag,
                        id = %id,
                        action = action.name(),
                        "dropping action for popped stack element"
                    );
                }
            }
        }

        let before: Vec<_> = (self.state)(state).ids().collect();
        let parent_effect = self.parent.reduce(state, action);
        let stack = (self.state)(state);
        effects.push(parent_effect);
        // Most recent first: ids are monotonic, so reverse stack order.
        for id in before.into_iter().rev() {
            if stack.get(id).is_none() {
                effects.push(Effect::cancel_scope(
                    CancelId::new(id.to_string()).prefixed(self.tag),
                ));
            }
        }

        Effect::merge(effects)
    }
}
