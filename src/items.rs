//! Items
//!
//! Cart line items live in an arena keyed by [`LineItemKey`]. Parent/child
//! relationships (bundle constituents, dependent SKUs) are stored as keys, and
//! every link is checked so the arena always describes a forest.

use petgraph::{algo::is_cyclic_directed, graphmap::DiGraphMap};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use thiserror::Error;

use crate::prices::Price;

new_key_type! {
    /// Line Item Key
    pub struct LineItemKey;
}

/// Errors related to line item arena operations.
#[derive(Debug, Error, PartialEq)]
pub enum LineItemError {
    /// The referenced item is not in the cart.
    #[error("line item {0:?} not found")]
    NotFound(LineItemKey),

    /// The item already has a parent and cannot be attached elsewhere.
    #[error("line item {0:?} already has a parent")]
    AlreadyAttached(LineItemKey),

    /// A link would make an item its own ancestor.
    #[error("linking {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Proposed parent
        parent: LineItemKey,

        /// Proposed child
        child: LineItemKey,
    },

    /// Another item already uses this line item id.
    #[error("duplicate line item id {0}")]
    DuplicateId(String),

    /// Quantities must be positive.
    #[error("line item {0} has zero quantity")]
    ZeroQuantity(String),
}

/// Kind of cart line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A plain SKU.
    #[default]
    Simple,

    /// A bundle whose price is apportioned to its constituents.
    Bundle,

    /// A SKU that carries dependent items (warranties, add-ons).
    SkuWithDependents,

    /// An item that depends on its parent SKU.
    Dependent,

    /// A constituent of a bundle.
    BundleConstituent,
}

/// A line item in a shopping cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLineItem<'a> {
    id: String,
    sku_code: String,
    item_type: ItemType,
    quantity: u32,
    price: Option<Price<'a>>,
    discountable: bool,
    shippable: bool,
}

impl<'a> CartLineItem<'a> {
    /// Create a new discountable, shippable line item.
    pub fn new(
        id: impl Into<String>,
        sku_code: impl Into<String>,
        item_type: ItemType,
        quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            sku_code: sku_code.into(),
            item_type,
            quantity,
            price: None,
            discountable: true,
            shippable: true,
        }
    }

    /// Set the resolved price.
    #[must_use]
    pub fn with_price(mut self, price: Price<'a>) -> Self {
        self.price = Some(price);
        self
    }

    /// Mark whether cart promotions may discount this item.
    #[must_use]
    pub fn with_discountable(mut self, discountable: bool) -> Self {
        self.discountable = discountable;
        self
    }

    /// Mark whether this item needs physical shipping.
    #[must_use]
    pub fn with_shippable(mut self, shippable: bool) -> Self {
        self.shippable = shippable;
        self
    }

    /// Line item id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// SKU code.
    pub fn sku_code(&self) -> &str {
        &self.sku_code
    }

    /// Item kind.
    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    /// Quantity purchased.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Resolved price, if one has been set.
    pub fn price(&self) -> Option<&Price<'a>> {
        self.price.as_ref()
    }

    /// Whether cart promotions may discount this item.
    pub fn is_discountable(&self) -> bool {
        self.discountable
    }

    /// Whether this item needs physical shipping.
    pub fn is_shippable(&self) -> bool {
        self.shippable
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    /// Whether the item is a bundle.
    pub fn is_bundle(&self) -> bool {
        self.item_type == ItemType::Bundle
    }
}

#[derive(Debug, Clone)]
struct LineItemNode<'a> {
    item: CartLineItem<'a>,
    parent: Option<LineItemKey>,
    children: SmallVec<[LineItemKey; 4]>,
}

/// Arena of cart line items.
#[derive(Debug, Clone, Default)]
pub struct LineItems<'a> {
    nodes: SlotMap<LineItemKey, LineItemNode<'a>>,
    roots: SmallVec<[LineItemKey; 8]>,
}

impl<'a> LineItems<'a> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_insert(&self, item: &CartLineItem<'_>) -> Result<(), LineItemError> {
        if item.quantity == 0 {
            return Err(LineItemError::ZeroQuantity(item.id.clone()));
        }

        if self.find_by_id(&item.id).is_some() {
            return Err(LineItemError::DuplicateId(item.id.clone()));
        }

        Ok(())
    }

    /// Insert a top-level item.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already used or the quantity is zero.
    pub fn insert(&mut self, item: CartLineItem<'a>) -> Result<LineItemKey, LineItemError> {
        self.check_insert(&item)?;

        let key = self.nodes.insert(LineItemNode {
            item,
            parent: None,
            children: SmallVec::new(),
        });

        self.roots.push(key);

        Ok(key)
    }

    /// Insert an item as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent is missing, the id is already used or the quantity is zero.
    pub fn insert_child(
        &mut self,
        parent: LineItemKey,
        item: CartLineItem<'a>,
    ) -> Result<LineItemKey, LineItemError> {
        self.check_insert(&item)?;

        if !self.nodes.contains_key(parent) {
            return Err(LineItemError::NotFound(parent));
        }

        let key = self.nodes.insert(LineItemNode {
            item,
            parent: Some(parent),
            children: SmallVec::new(),
        });

        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(key);
        }

        Ok(key)
    }

    /// Attach an existing top-level item under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if either item is missing, the child already has a
    /// parent, or the link would create a cycle.
    pub fn attach(&mut self, parent: LineItemKey, child: LineItemKey) -> Result<(), LineItemError> {
        if !self.nodes.contains_key(parent) {
            return Err(LineItemError::NotFound(parent));
        }

        let child_node = self.nodes.get(child).ok_or(LineItemError::NotFound(child))?;

        if child_node.parent.is_some() {
            return Err(LineItemError::AlreadyAttached(child));
        }

        let mut graph = self.link_graph();
        graph.add_edge(parent, child, ());

        if parent == child || is_cyclic_directed(&graph) {
            return Err(LineItemError::CycleDetected { parent, child });
        }

        self.roots.retain(|root| *root != child);

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }

        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }

        Ok(())
    }

    fn link_graph(&self) -> DiGraphMap<LineItemKey, ()> {
        let mut graph = DiGraphMap::new();

        for (key, node) in &self.nodes {
            graph.add_node(key);

            for child in &node.children {
                graph.add_edge(key, *child, ());
            }
        }

        graph
    }

    /// Remove an item and all of its descendants, returning them in traversal order.
    ///
    /// # Errors
    ///
    /// Returns [`LineItemError::NotFound`] if the item is not in the arena.
    pub fn remove(&mut self, key: LineItemKey) -> Result<Vec<CartLineItem<'a>>, LineItemError> {
        let parent = self
            .nodes
            .get(key)
            .ok_or(LineItemError::NotFound(key))?
            .parent;

        let subtree = self.subtree(key);

        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
            parent.children.retain(|child| *child != key);
        }

        self.roots.retain(|root| *root != key);

        Ok(subtree
            .into_iter()
            .filter_map(|key| self.nodes.remove(key))
            .map(|node| node.item)
            .collect())
    }

    /// Item by key.
    pub fn get(&self, key: LineItemKey) -> Option<&CartLineItem<'a>> {
        self.nodes.get(key).map(|node| &node.item)
    }

    /// Mutable item by key.
    pub fn get_mut(&mut self, key: LineItemKey) -> Option<&mut CartLineItem<'a>> {
        self.nodes.get_mut(key).map(|node| &mut node.item)
    }

    /// Whether the key refers to an item in the arena.
    pub fn contains(&self, key: LineItemKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Parent of an item.
    pub fn parent(&self, key: LineItemKey) -> Option<LineItemKey> {
        self.nodes.get(key).and_then(|node| node.parent)
    }

    /// Children of an item, in insertion order.
    pub fn children(&self, key: LineItemKey) -> &[LineItemKey] {
        match self.nodes.get(key) {
            Some(node) => node.children.as_slice(),
            None => &[],
        }
    }

    /// Top-level items, in insertion order.
    pub fn roots(&self) -> &[LineItemKey] {
        &self.roots
    }

    /// Whether the item sits under a bundle.
    pub fn is_bundle_constituent(&self, key: LineItemKey) -> bool {
        self.parent(key)
            .and_then(|parent| self.get(parent))
            .is_some_and(CartLineItem::is_bundle)
    }

    /// Find an item by its line item id.
    pub fn find_by_id(&self, id: &str) -> Option<LineItemKey> {
        self.nodes
            .iter()
            .find(|(_, node)| node.item.id == id)
            .map(|(key, _)| key)
    }

    /// Find every item with the given SKU code.
    pub fn find_by_sku(&self, sku_code: &str) -> SmallVec<[LineItemKey; 2]> {
        self.keys()
            .into_iter()
            .filter(|key| self.get(*key).is_some_and(|item| item.sku_code == sku_code))
            .collect()
    }

    /// `key` followed by all of its descendants, depth first.
    ///
    /// Each item is visited at most once.
    pub fn subtree(&self, key: LineItemKey) -> Vec<LineItemKey> {
        let mut visited = FxHashSet::default();
        let mut out = Vec::new();

        self.walk(key, &mut visited, &mut out);

        out
    }

    fn walk(&self, key: LineItemKey, visited: &mut FxHashSet<LineItemKey>, out: &mut Vec<LineItemKey>) {
        if !self.nodes.contains_key(key) || !visited.insert(key) {
            return;
        }

        out.push(key);

        for child in self.children(key) {
            self.walk(*child, visited, out);
        }
    }

    /// Priced leaves beneath (and including) `key`: every item in the subtree
    /// that is not itself a bundle.
    pub fn leaves(&self, key: LineItemKey) -> Vec<LineItemKey> {
        self.subtree(key)
            .into_iter()
            .filter(|key| self.get(*key).is_some_and(|item| !item.is_bundle()))
            .collect()
    }

    /// All keys, roots first and each followed by its descendants.
    pub fn keys(&self) -> Vec<LineItemKey> {
        let mut visited = FxHashSet::default();
        let mut out = Vec::with_capacity(self.nodes.len());

        for root in &self.roots {
            self.walk(*root, &mut visited, &mut out);
        }

        out
    }

    /// Iterate items in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (LineItemKey, &CartLineItem<'a>)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(key).map(|item| (key, item)))
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
