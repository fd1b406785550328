//! Comment threads: turning the flat comment list of one event into a tree.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::record::EventComment;

/// A comment with its replies, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
  #[serde(flatten)]
  pub comment:  EventComment,
  pub children: Vec<CommentNode>,
}

/// Build the reply tree for one event's comments.
///
/// Comments whose parent is absent from `comments` become roots. Roots and
/// each sibling group are ordered by `created_at`, ties keeping input order.
/// Every comment appears exactly once: when parent links form a cycle, the
/// oldest comment of the cycle is promoted to a root.
pub fn build(comments: &[EventComment]) -> Vec<CommentNode> {
  let ids: HashSet<i64> = comments.iter().map(|c| c.id).collect();

  let mut roots: Vec<&EventComment> = Vec::new();
  let mut replies: HashMap<i64, Vec<&EventComment>> = HashMap::new();
  for comment in comments {
    match comment.parent_comment_id {
      Some(parent) if ids.contains(&parent) && parent != comment.id => {
        replies.entry(parent).or_default().push(comment);
      }
      _ => roots.push(comment),
    }
  }

  roots.sort_by_key(|c| c.created_at);
  let mut seen = HashSet::new();
  let mut tree: Vec<CommentNode> =
    roots.into_iter().map(|c| node(c, &replies, &mut seen)).collect();

  let mut stranded: Vec<&EventComment> =
    comments.iter().filter(|c| !seen.contains(&c.id)).collect();
  if !stranded.is_empty() {
    stranded.sort_by_key(|c| c.created_at);
    for comment in stranded {
      if !seen.contains(&comment.id) {
        tree.push(node(comment, &replies, &mut seen));
      }
    }
    tree.sort_by_key(|n| n.comment.created_at);
  }
  tree
}

fn node(
  comment: &EventComment,
  replies: &HashMap<i64, Vec<&EventComment>>,
  seen: &mut HashSet<i64>,
) -> CommentNode {
  seen.insert(comment.id);
  let mut kids = replies.get(&comment.id).cloned().unwrap_or_default();
  kids.sort_by_key(|c| c.created_at);

  let mut children = Vec::with_capacity(kids.len());
  for kid in kids {
    if !seen.contains(&kid.id) {
      children.push(node(kid, replies, seen));
    }
  }
  CommentNode { comment: comment.clone(), children }
}
