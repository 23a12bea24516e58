//! Heap bank allocator
//!
//! The heap region is 128 banks of 64 bytes. Allocation state is a
//! list of nodes in ascending address order which partitions the
//! banks exactly: every bank belongs to one node, a node is free when
//! its allocated size is zero, and two adjacent free nodes never
//! survive a free (they coalesce). The first node is the stable entry
//! point and is never removed.
//!
//! An address is usable only while it falls inside the allocated size
//! of some live node; the unused tail of an allocation's final bank
//! stays invalid.

use super::pma::{BANK_BLOCK_SIZE, HEAP_BANK_NUM, HEAP_START};

#[derive(Debug)]
struct HeapNode {
    address: u32,
    banks: u32,
    allocated_size: u32,
}

impl HeapNode {
    fn is_free(&self) -> bool {
        self.allocated_size == 0
    }
}

#[derive(Debug)]
pub struct HeapList {
    nodes: Vec<HeapNode>,
}

impl HeapList {
    /// A single free node spanning all 128 banks
    pub fn new() -> Self {
        Self {
            nodes: vec![HeapNode {
                address: HEAP_START,
                banks: HEAP_BANK_NUM,
                allocated_size: 0,
            }],
        }
    }

    /// Allocate size bytes, rounded up to whole banks, at the first
    /// free node with enough room. Returns the base address of the
    /// allocation, or 0 if size is 0 or no free node is big enough.
    pub fn malloc(&mut self, size: u32) -> u32 {
        let required = size.wrapping_add(BANK_BLOCK_SIZE - 1) / BANK_BLOCK_SIZE;
        if required == 0 {
            return 0;
        }
        for n in 0..self.nodes.len() {
            let node = &self.nodes[n];
            if node.is_free() && node.banks >= required {
                let address = node.address;
                if node.banks > required {
                    // Split the surplus banks into a new free node
                    // just after this one
                    let surplus = HeapNode {
                        address: address + required * BANK_BLOCK_SIZE,
                        banks: node.banks - required,
                        allocated_size: 0,
                    };
                    self.nodes.insert(n + 1, surplus);
                }
                let node = &mut self.nodes[n];
                node.banks = required;
                node.allocated_size = size;
                return address;
            }
        }
        0
    }

    /// Release the allocation whose base address is exactly address.
    /// Freeing the middle of an allocation, or an address that is not
    /// allocated, returns false.
    pub fn free(&mut self, address: u32) -> bool {
        let Some(n) = self
            .nodes
            .iter()
            .position(|node| !node.is_free() && node.address == address)
        else {
            return false;
        };
        self.nodes[n].allocated_size = 0;

        // Absorb the following node if it is also free
        if n + 1 < self.nodes.len() && self.nodes[n + 1].is_free() {
            let banks = self.nodes.remove(n + 1).banks;
            self.nodes[n].banks += banks;
        }

        // Merge into the preceding node if it is free
        if n > 0 && self.nodes[n - 1].is_free() {
            let banks = self.nodes.remove(n).banks;
            self.nodes[n - 1].banks += banks;
        }

        true
    }

    /// True while addr lies inside the allocated bytes of some live
    /// allocation
    pub fn contains(&self, addr: u32) -> bool {
        self.nodes.iter().any(|node| {
            !node.is_free()
                && addr >= node.address
                && addr < node.address + node.allocated_size
        })
    }
}
