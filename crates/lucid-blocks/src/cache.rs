//! Process-local block cache.
//!
//! LRU over the last N blocks by hash with a parallel height → hash map.
//! Populated on every successful add and on cache-miss reads.

use std::collections::{HashMap, VecDeque};

use lucid_types::Block;

/// Default number of blocks kept hot.
pub const BLOCK_CACHE_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct BlockCache {
    capacity: usize,
    blocks: HashMap<String, Block>,
    order: VecDeque<String>,
    by_height: HashMap<u64, String>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            blocks: HashMap::new(),
            order: VecDeque::new(),
            by_height: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn insert(&mut self, block: Block) {
        let hash = block.hash.clone();
        if self.blocks.contains_key(&hash) {
            self.touch(&hash);
            return;
        }

        self.by_height.insert(block.height, hash.clone());
        self.blocks.insert(hash.clone(), block);
        self.order.push_back(hash);

        while self.blocks.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                if let Some(block) = self.blocks.remove(&evicted) {
                    if self.by_height.get(&block.height) == Some(&evicted) {
                        self.by_height.remove(&block.height);
                    }
                }
            }
        }
    }

    pub fn get_by_hash(&mut self, hash: &str) -> Option<Block> {
        let block = self.blocks.get(hash).cloned()?;
        self.touch(hash);
        Some(block)
    }

    pub fn get_by_height(&mut self, height: u64) -> Option<Block> {
        let hash = self.by_height.get(&height)?.clone();
        self.get_by_hash(&hash)
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.order.clear();
        self.by_height.clear();
    }

    fn touch(&mut self, hash: &str) {
        if let Some(pos) = self.order.iter().position(|h| h == hash) {
            self.order.remove(pos);
            self.order.push_back(hash.to_string());
        }
    }
}
