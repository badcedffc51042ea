//! Symbol to order book registry.
//!
//! Read-mostly sharded map; lookups take a shard read lock, first-touch
//! creation a brief shard write lock. Concurrent first-touch on the same
//! symbol yields one book instance.

use std::sync::Arc;

use dashmap::DashMap;

use crate::book::{OrderBook, DEFAULT_MAX_ORDERS_PER_BOOK};

pub struct BookRegistry {
    books: DashMap<String, Arc<OrderBook>>,
    max_orders_per_book: u32,
}

impl BookRegistry {
    pub fn new(max_orders_per_book: u32) -> Self {
        Self {
            books: DashMap::new(),
            max_orders_per_book,
        }
    }

    /// Fetch the book for `symbol`, creating it on first reference.
    pub fn get_or_create(&self, symbol: &str) -> Arc<OrderBook> {
        if let Some(book) = self.books.get(symbol) {
            return Arc::clone(&book);
        }
        let capacity = self.max_orders_per_book;
        Arc::clone(
            &self
                .books
                .entry(symbol.to_owned())
                .or_insert_with(|| Arc::new(OrderBook::with_capacity(symbol, capacity))),
        )
    }

    pub fn get(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        self.books.get(symbol).map(|book| Arc::clone(&book))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.books.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Administrative removal; not used on the matching path.
    pub fn remove(&self, symbol: &str) -> bool {
        self.books.remove(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Resting orders across all books.
    pub fn total_order_count(&self) -> usize {
        self.books.iter().map(|entry| entry.value().order_count()).sum()
    }

    /// Trades executed across all books.
    pub fn total_trade_count(&self) -> u64 {
        self.books.iter().map(|entry| entry.value().trade_count()).sum()
    }
}

impl Default for BookRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ORDERS_PER_BOOK)
    }
}
