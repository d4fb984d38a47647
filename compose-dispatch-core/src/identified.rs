//! Ordered collections with stable, caller-assigned identity
//!
//! [`IdentifiedVec`] preserves insertion order and offers O(1) lookup by id.
//! Removing an element never changes any other element's id, which is what
//! makes identity-based effect cancellation safe under concurrent removal.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::action::Action;
use crate::cancel::CancelId;
use crate::effect::Effect;
use crate::reducer::{CasePath, Reducer};

/// An element with a stable identity.
///
/// The id must not change while the element is stored in an
/// [`IdentifiedVec`]; mutate everything else freely.
pub trait Identifiable {
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

/// Ordered sequence of identifiable elements with O(1) id lookup.
pub struct IdentifiedVec<T: Identifiable> {
    elements: Vec<T>,
    index: HashMap<T::Id, usize>,
}

impl<T: Identifiable> IdentifiedVec<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append an element, preserving insertion order.
    ///
    /// Returns `false` (and drops the element) if an element with the same
    /// id is already present.
    pub fn push(&mut self, element: T) -> bool {
        let id = element.id();
        if self.index.contains_key(&id) {
            tracing::debug!(id = ?id, "duplicate id ignored");
            return false;
        }
        self.index.insert(id, self.elements.len());
        self.elements.push(element);
        true
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.index.get(id).map(|&i| &self.elements[i])
    }

    pub fn get_mut(&mut self, id: &T::Id) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&i) => self.elements.get_mut(i),
            None => None,
        }
    }

    /// Remove the element with `id`, returning it. Other elements keep
    /// their ids; positions after the removal point shift down by one.
    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        let i = self.index.remove(id)?;
        let element = self.elements.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(element)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.index.contains_key(id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = T::Id> + '_ {
        self.elements.iter().map(|e| e.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    /// Iterate mutably. Ids must not be mutated through this.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.elements.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T: Identifiable> Default for IdentifiedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identifiable> FromIterator<T> for IdentifiedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vec = Self::new();
        for element in iter {
            vec.push(element);
        }
        vec
    }
}

impl<T: Identifiable + Debug> Debug for IdentifiedVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.elements.iter()).finish()
    }
}

/// Routes `(id, child_action)` pairs to the elements of an identified
/// collection. Built with
/// [`ReducerExt::for_each`](crate::reducer::ReducerExt::for_each).
pub struct ForEach<P, C>
where
    P: Reducer,
    C: Reducer,
    C::State: Identifiable,
{
    parent: P,
    tag: &'static str,
    state: fn(&mut P::State) -> &mut IdentifiedVec<C::State>,
    case: CasePath<P::Action, (<C::State as Identifiable>::Id, C::Action)>,
    child: C,
}

impl<P, C> ForEach<P, C>
where
    P: Reducer,
    C: Reducer,
    C::State: Identifiable,
{
    pub(crate) fn new(
        parent: P,
        tag: &'static str,
        state: fn(&mut P::State) -> &mut IdentifiedVec<C::State>,
        case: CasePath<P::Action, (<C::State as Identifiable>::Id, C::Action)>,
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

impl<P, C> Reducer for ForEach<P, C>
where
    P: Reducer,
    C: Reducer,
    C::State: Identifiable,
    <C::State as Identifiable>::Id: Display,
{
    type State = P::State;
    type Action = P::Action;

    fn reduce(&self, state: &mut P::State, action: P::Action) -> Effect<P::Action> {
        let mut effects = Vec::new();

        // Child runs before the parent, so the parent observes updated
        // element state when it inspects the same action.
        if let Ok((id, child_action)) = (self.case.extract)(action.clone()) {
            match (self.state)(state).get_mut(&id) {
                Some(element) => {
                    let embed = self.case.embed;
                    let segment = id.to_string();
                    let effect_id = id.clone();
                    effects.push(
                        self.child
                            .reduce(element, child_action)
                            .map(move |ca| embed((effect_id.clone(), ca)))
                            .scoped(&segment)
                            .scoped(self.tag),
                    );
                }
                None => {
                    // Expected race: the element was removed while an action
                    // for it was in flight.
                    tracing::debug!(
                        tag = self.tag,
                        id = %id,
                        action = action.name(),
                        "dropping action for missing element"
                    );
                }
            }
        }

        let before: Vec<_> = (self.state)(state).ids().collect();
        let parent_effect = self.parent.reduce(state, action);
        let rows = (self.state)(state);
        effects.push(parent_effect);
        for id in before {
            if !rows.contains(&id) {
                effects.push(Effect::cancel_scope(
                    CancelId::new(id.to_string()).prefixed(self.tag),
                ));
            }
        }

        Effect::merge(effects)
    }
}
