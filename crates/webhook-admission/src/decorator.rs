//! Composition of webhook invoker decorators.
//!
//! A decorator turns an invoker into another invoker of the same shape. The
//! same algebra serves both invoker shapes: `I` is either
//! `dyn MutatingWebhookInvoker` or `dyn ValidatingWebhookInvoker`.

use std::sync::Arc;

/// Wraps an invoker with additional behavior.
pub trait Decorator<I: ?Sized>: Send + Sync {
    fn decorate(&self, invoker: Arc<I>) -> Arc<I>;
}

/// Adapts a closure into a [`Decorator`].
pub struct DecoratorFn<F>(pub F);

impl<I, F> Decorator<I> for DecoratorFn<F>
where
    I: ?Sized,
    F: Fn(Arc<I>) -> Arc<I> + Send + Sync,
{
    fn decorate(&self, invoker: Arc<I>) -> Arc<I> {
        (self.0)(invoker)
    }
}

/// An ordered list of decorators, acting as a single decorator.
///
/// `[d1, d2, ..., dn]` decorates `base` as `d1(d2(...dn(base)))`: the first
/// decorator is the outermost one. It is entered first and sees the final
/// outcome of every inner decorator.
pub struct Decorators<I: ?Sized> {
    decorators: Vec<Arc<dyn Decorator<I>>>,
}

impl<I: ?Sized> Decorators<I> {
    pub fn new() -> Self {
        Decorators {
            decorators: Vec::new(),
        }
    }

    pub fn push(&mut self, decorator: Arc<dyn Decorator<I>>) {
        self.decorators.push(decorator);
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

impl<I: ?Sized> Default for Decorators<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ?Sized> Clone for Decorators<I> {
    fn clone(&self) -> Self {
        Decorators {
            decorators: self.decorators.clone(),
        }
    }
}

impl<I: ?Sized> From<Vec<Arc<dyn Decorator<I>>>> for Decorators<I> {
    fn from(decorators: Vec<Arc<dyn Decorator<I>>>) -> Self {
        Decorators { decorators }
    }
}

impl<I: ?Sized> Decorator<I> for Decorators<I> {
    fn decorate(&self, invoker: Arc<I>) -> Arc<I> {
        self.decorators
            .iter()
            .rev()
            .fold(invoker, |decorated, decorator| decorator.decorate(decorated))
    }
}
