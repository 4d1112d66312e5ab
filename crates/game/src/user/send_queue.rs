use std::collections::VecDeque;

/// Packs small messages into chunks no larger than one unreliable datagram.
/// A message bigger than the limit gets a chunk of its own.
#[derive(Debug)]
pub struct SendQueue {
    max_chunk: usize,
    chunks: VecDeque<Vec<u8>>,
}

impl SendQueue {
    pub fn new(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.max(1),
            chunks: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        if let Some(last) = self.chunks.back_mut() {
            if last.len() + data.len() <= self.max_chunk {
                last.extend_from_slice(data);
                return;
            }
        }

        let mut chunk = Vec::with_capacity(self.max_chunk.max(data.len()));
        chunk.extend_from_slice(data);
        self.chunks.push_back(chunk);
    }

    pub fn dequeue(&mut self) -> Option<Vec<u8>> {
        self.chunks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_in_order() {
        let mut queue = SendQueue::new(8);
        queue.enqueue(&[1, 1]);
        queue.enqueue(&[2, 2, 2]);
        queue.enqueue(&[3, 3, 3, 3]);

        assert_eq!(queue.dequeue(), Some(vec![1, 1, 2, 2, 2]));
        assert_eq!(queue.dequeue(), Some(vec![3, 3, 3, 3]));
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn oversized_message_is_alone() {
        let mut queue = SendQueue::new(4);
        queue.enqueue(&[1]);
        queue.enqueue(&[9; 6]);
        queue.enqueue(&[2]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Some(vec![1]));
        assert_eq!(queue.dequeue(), Some(vec![9; 6]));
        assert_eq!(queue.dequeue(), Some(vec![2]));
    }
}
