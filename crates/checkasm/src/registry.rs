//! Function registry.
//!
//! One node per distinct function name, kept in a left-leaning red-black tree
//! ordered by [`natural_cmp`]. Each node carries the chain of implementations
//! registered under its name, oldest first: the reference implementation is
//! registered during the first pass and every later tier appends the version
//! it selected.
//!
//! Nodes live in an arena and link to their children by index.

use core::{any::Any, cmp::Ordering, fmt};

use platform::Caps;

use crate::{error::Result, names::natural_cmp};

/// Handle to a node in a [`Registry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One registered implementation of a function.
pub struct Version {
  func: Box<dyn Any>,

  /// Capabilities that were selected when the version was registered.
  pub caps: Caps,

  /// Cleared on the first failure.
  pub ok: bool,

  /// Benchmarked calls.
  pub iterations: u64,

  /// Cycles spent over `iterations` calls.
  pub cycles: u64,
}

impl Version {
  /// `true` if this version holds exactly `func`.
  #[inline]
  #[must_use]
  pub fn holds<F: PartialEq + 'static>(&self, func: &F) -> bool {
    self.func.downcast_ref::<F>() == Some(func)
  }

  /// The callable, if it was registered as an `F`.
  #[inline]
  #[must_use]
  pub fn func<F: Copy + 'static>(&self) -> Option<F> {
    self.func.downcast_ref::<F>().copied()
  }
}

impl fmt::Debug for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Version")
      .field("caps", &self.caps)
      .field("ok", &self.ok)
      .field("iterations", &self.iterations)
      .field("cycles", &self.cycles)
      .finish_non_exhaustive()
  }
}

#[derive(Debug)]
struct Node {
  name: String,
  red: bool,
  versions: Vec<Version>,
  children: [Option<NodeId>; 2],
}

/// Result of [`Registry::register_version`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration<F> {
  /// The callable is already in the chain; nothing new to test.
  AlreadyTested,

  /// A new version was appended. `reference` is the newest earlier version
  /// still marked ok, or the new callable itself when there is none.
  Test { reference: F },
}

/// Name-ordered tree of registered functions.
#[derive(Debug, Default)]
pub struct Registry {
  nodes: Vec<Node>,
  root: Option<NodeId>,
}

impl Registry {
  /// Create an empty registry.
  #[must_use]
  pub const fn new() -> Self {
    Self {
      nodes: Vec::new(),
      root: None,
    }
  }

  /// Number of distinct function names.
  #[inline]
  #[must_use]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// `true` if nothing was registered.
  #[inline]
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Look up `name`, inserting an empty node when it is absent.
  ///
  /// # Errors
  ///
  /// Returns [`Error::Alloc`](crate::Error::Alloc) if the node or its name
  /// cannot be allocated. The registry is left unchanged in that case.
  pub fn find_or_create(&mut self, name: &str) -> Result<NodeId> {
    let (root, found, inserted) = self.insert_at(self.root, name)?;
    self.root = Some(root);
    if inserted {
      self.nodes[root.0].red = false;
      tracing::trace!(name, nodes = self.nodes.len(), "registered function name");
    }
    Ok(found)
  }

  /// Append `func` to the chain of `node` unless it is already there.
  ///
  /// # Errors
  ///
  /// Returns [`Error::Alloc`](crate::Error::Alloc) if the chain cannot grow.
  pub fn register_version<F>(&mut self, node: NodeId, func: F, caps: Caps) -> Result<Registration<F>>
  where
    F: Copy + PartialEq + 'static,
  {
    let versions = &mut self.nodes[node.0].versions;

    let mut reference = func;
    for version in versions.iter() {
      if version.holds(&func) {
        return Ok(Registration::AlreadyTested);
      }
      if version.ok
        && let Some(f) = version.func::<F>()
      {
        reference = f;
      }
    }

    versions.try_reserve(1)?;
    versions.push(Version {
      func: Box::new(func),
      caps,
      ok: true,
      iterations: 0,
      cycles: 0,
    });

    Ok(Registration::Test { reference })
  }

  /// Name of `node`.
  #[inline]
  #[must_use]
  pub fn name(&self, node: NodeId) -> &str {
    &self.nodes[node.0].name
  }

  /// Versions of `node`, oldest first.
  #[inline]
  #[must_use]
  pub fn versions(&self, node: NodeId) -> &[Version] {
    &self.nodes[node.0].versions
  }

  /// Newest version of `node`.
  #[inline]
  pub fn latest_mut(&mut self, node: NodeId) -> Option<&mut Version> {
    self.nodes[node.0].versions.last_mut()
  }

  /// Visit every node in name order.
  pub fn in_order<'a>(&'a self, mut visit: impl FnMut(&'a str, &'a [Version])) {
    self.walk(self.root, &mut visit);
  }

  /// Release all nodes, children before their parent.
  pub fn clear(&mut self) {
    if let Some(root) = self.root.take() {
      self.release(root);
    }
    self.nodes.clear();
  }

  fn walk<'a>(&'a self, link: Option<NodeId>, visit: &mut impl FnMut(&'a str, &'a [Version])) {
    if let Some(id) = link {
      let node = &self.nodes[id.0];
      self.walk(node.children[0], visit);
      visit(&node.name, &node.versions);
      self.walk(node.children[1], visit);
    }
  }

  fn release(&mut self, id: NodeId) {
    let [left, right] = self.nodes[id.0].children;
    for child in [left, right].into_iter().flatten() {
      self.release(child);
    }
    let node = &mut self.nodes[id.0];
    node.children = [None, None];
    drop(core::mem::take(&mut node.versions));
    drop(core::mem::take(&mut node.name));
  }

  /// Returns the new root of the subtree at `link`, the node for `name`,
  /// and whether it was inserted.
  fn insert_at(&mut self, link: Option<NodeId>, name: &str) -> Result<(NodeId, NodeId, bool)> {
    let Some(at) = link else {
      let id = self.alloc(name)?;
      return Ok((id, id, true));
    };

    let dir = match natural_cmp(name, &self.nodes[at.0].name) {
      Ordering::Equal => return Ok((at, at, false)),
      Ordering::Less => 0,
      Ordering::Greater => 1,
    };

    let (child, found, inserted) = self.insert_at(self.nodes[at.0].children[dir], name)?;
    self.nodes[at.0].children[dir] = Some(child);

    let top = if inserted { self.balance(at) } else { at };
    Ok((top, found, inserted))
  }

  fn alloc(&mut self, name: &str) -> Result<NodeId> {
    let mut owned = String::new();
    owned.try_reserve_exact(name.len())?;
    owned.push_str(name);

    self.nodes.try_reserve(1)?;
    let id = NodeId(self.nodes.len());
    self.nodes.push(Node {
      name: owned,
      red: true,
      versions: Vec::new(),
      children: [None, None],
    });
    Ok(id)
  }

  #[inline]
  fn is_red(&self, link: Option<NodeId>) -> bool {
    link.is_some_and(|id| self.nodes[id.0].red)
  }

  /// Apply at most one fix-up at `at` and return the subtree's new root.
  fn balance(&mut self, at: NodeId) -> NodeId {
    let [left, right] = self.nodes[at.0].children;

    if self.is_red(left) && self.is_red(right) {
      self.nodes[at.0].red = !self.nodes[at.0].red;
      for child in [left, right].into_iter().flatten() {
        self.nodes[child.0].red = false;
      }
      at
    } else if !self.is_red(left) && self.is_red(right) {
      self.rotate(at, 0)
    } else if self.is_red(left) && self.is_red(left.and_then(|l| self.nodes[l.0].children[0])) {
      self.rotate(at, 1)
    } else {
      at
    }
  }

  /// Rotate towards `dir` (0 = left, 1 = right).
  fn rotate(&mut self, at: NodeId, dir: usize) -> NodeId {
    let Some(pivot) = self.nodes[at.0].children[dir ^ 1] else {
      return at;
    };

    self.nodes[at.0].children[dir ^ 1] = self.nodes[pivot.0].children[dir];
    self.nodes[pivot.0].children[dir] = Some(at);
    self.nodes[pivot.0].red = self.nodes[at.0].red;
    self.nodes[at.0].red = true;
    pivot
  }
}

impl Drop for Registry {
  fn drop(&mut self) {
    self.clear();
  }
}
