//! JobSource trait - Dispatcher input interface
//!
//! Any closable stream of values can feed a dispatcher. `None` from
//! `next_input` means the stream is closed and no more jobs will arrive.

use tokio::sync::mpsc;

/// Input stream trait
#[trait_variant::make(JobSource: Send)]
pub trait LocalJobSource<T> {
    /// Next input, or `None` once the source is closed
    async fn next_input(&mut self) -> Option<T>;
}

impl<T: Send> JobSource<T> for mpsc::Receiver<T> {
    async fn next_input(&mut self) -> Option<T> {
        self.recv().await
    }
}

impl<T: Send> JobSource<T> for mpsc::UnboundedReceiver<T> {
    async fn next_input(&mut self) -> Option<T> {
        self.recv().await
    }
}

/// Source backed by an iterator; closes when the iterator is exhausted
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    pub fn new<C>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: items.into_iter(),
        }
    }
}

impl<I> JobSource<I::Item> for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    async fn next_input(&mut self) -> Option<I::Item> {
        self.iter.next()
    }
}
