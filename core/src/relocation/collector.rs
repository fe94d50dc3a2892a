//! Thread enumeration
//!
//! Resolves any member post to its root and walks the root's replies page by
//! page until the store reports no more. The root comes first, followed by
//! the replies sorted by `(created_at, id)` with duplicates dropped, so the
//! same thread is returned whichever member was used as the seed.

use crate::store::{read_error, PostStore, ReplyCursor};
use crate::types::*;
use crate::{Error, Result};
use std::collections::HashSet;

/// Read-only thread collector over a [`PostStore`]
pub struct PostSetCollector<'a> {
    store: &'a dyn PostStore,
    page_size: usize,
}

impl<'a> PostSetCollector<'a> {
    pub fn new(store: &'a dyn PostStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Fetch `seed` and the root of its thread
    ///
    /// For a root, both halves of the pair are the same post.
    pub async fn resolve_root(&self, seed: PostId) -> Result<(Post, Post)> {
        let post = self
            .store
            .get_post(seed)
            .await
            .map_err(|e| read_error(format!("Post {}", seed), e))?;

        let root = match post.root_id {
            None => post.clone(),
            Some(root_id) => {
                let root = self
                    .store
                    .get_post(root_id)
                    .await
                    .map_err(|e| read_error(format!("Thread root {}", root_id), e))?;
                if !root.is_root() {
                    return Err(Error::Store(format!(
                        "Post {} names {} as its root, but that post is itself a reply",
                        seed, root_id
                    )));
                }
                root
            }
        };

        Ok((post, root))
    }

    /// The relocatable posts of the thread containing `seed`, in thread order
    ///
    /// Fails with `NotRelocatable` when the seed (or its root) is a system or
    /// combined-activity post. Non-relocatable replies are skipped.
    pub async fn collect_thread(&self, seed: PostId) -> Result<Vec<Post>> {
        let (post, root) = self.resolve_root(seed).await?;
        for p in [&post, &root] {
            if !p.is_relocatable() {
                return Err(Error::NotRelocatable {
                    post: p.id,
                    message_type: p.message_type,
                });
            }
        }

        let mut posts = self.walk(root).await?;
        posts.retain(Post::is_relocatable);
        Ok(posts)
    }

    /// Every post of the thread containing `seed`, system posts included
    pub async fn collect_members(&self, seed: PostId) -> Result<Vec<Post>> {
        let (_, root) = self.resolve_root(seed).await?;
        self.walk(root).await
    }

    /// Whether `root_id` currently has any replies
    pub async fn has_replies(&self, root_id: PostId) -> Result<bool> {
        let page = self
            .store
            .get_replies(ReplyCursor::new(root_id, 1))
            .await
            .map_err(|e| read_error(format!("Replies of {}", root_id), e))?;
        Ok(!page.posts.is_empty())
    }

    /// Root followed by all replies, sorted and deduplicated
    async fn walk(&self, root: Post) -> Result<Vec<Post>> {
        let root_id = root.id;
        let mut seen = HashSet::from([root_id]);
        let mut replies = Vec::new();
        let mut pages = 0usize;
        let mut cursor = Some(ReplyCursor::new(root_id, self.page_size));

        while let Some(current) = cursor {
            let page = self
                .store
                .get_replies(current)
                .await
                .map_err(|e| read_error(format!("Replies of {}", root_id), e))?;
            pages += 1;

            if page.posts.is_empty() {
                if page.next.is_some() {
                    tracing::warn!(
                        root = %root_id,
                        pages,
                        "Store returned an empty page that claims more; stopping"
                    );
                }
                break;
            }

            for post in page.posts {
                if post.root_id != Some(root_id) {
                    tracing::warn!(
                        root = %root_id,
                        post = %post.id,
                        "Skipping post outside the thread"
                    );
                    continue;
                }
                if seen.insert(post.id) {
                    replies.push(post);
                }
            }

            cursor = match page.next {
                Some(next) if next == current => {
                    tracing::warn!(
                        root = %root_id,
                        pages,
                        "Reply cursor did not advance; stopping"
                    );
                    None
                }
                next => next,
            };
        }

        replies.sort_by_key(Post::order_key);
        let mut posts = Vec::with_capacity(replies.len() + 1);
        posts.push(root);
        posts.extend(replies);

        tracing::debug!(
            root = %root_id,
            pages,
            posts = posts.len(),
            "Collected thread"
        );

        Ok(posts)
    }
}
