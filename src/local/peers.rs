//! Manage announced peers for info_hashes

use std::{net::SocketAddr, num::NonZeroUsize};

use lru::LruCache;
use rand::{seq::SliceRandom, thread_rng};

use crate::Id;

/// Most peers returned for a single get_peers request.
const MAX_PEERS_RESPONSE: usize = 20;

#[derive(Debug)]
/// Bounded store of announced peers, evicting the least recently announced
/// info_hash, and the least recently announced peer within each info_hash.
pub struct PeersStore {
    info_hashes: LruCache<Id, LruCache<SocketAddr, ()>>,
    max_peers: NonZeroUsize,
}

impl PeersStore {
    pub fn new(max_info_hashes: NonZeroUsize, max_peers: NonZeroUsize) -> Self {
        Self {
            info_hashes: LruCache::new(max_info_hashes),
            max_peers,
        }
    }

    pub fn add_peer(&mut self, info_hash: Id, peer: SocketAddr) {
        if let Some(peers) = self.info_hashes.get_mut(&info_hash) {
            peers.put(peer, ());
        } else {
            let mut peers = LruCache::new(self.max_peers);
            peers.put(peer, ());
            self.info_hashes.put(info_hash, peers);
        }
    }

    /// Up to 20 random peers announced on `info_hash`.
    pub fn get_random_peers(&mut self, info_hash: &Id) -> Option<Vec<SocketAddr>> {
        let peers: Vec<SocketAddr> = self
            .info_hashes
            .get(info_hash)?
            .iter()
            .map(|(peer, _)| *peer)
            .collect();

        Some(
            peers
                .choose_multiple(&mut thread_rng(), MAX_PEERS_RESPONSE)
                .copied()
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store(max_info_hashes: usize, max_peers: usize) -> PeersStore {
        PeersStore::new(
            NonZeroUsize::new(max_info_hashes).unwrap(),
            NonZeroUsize::new(max_peers).unwrap(),
        )
    }

    #[test]
    fn deduplicates_peers() {
        let mut store = store(10, 10);
        let info_hash = Id::random();

        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 1], 0)));
        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 1], 0)));
        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 2], 0)));

        let mut peers = store.get_random_peers(&info_hash).unwrap();
        peers.sort();

        assert_eq!(
            peers,
            vec![
                SocketAddr::from(([127, 0, 1, 1], 0)),
                SocketAddr::from(([127, 0, 1, 2], 0)),
            ]
        );
    }

    #[test]
    fn evicts_oldest_peer() {
        let mut store = store(10, 2);
        let info_hash = Id::random();

        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 1], 0)));
        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 2], 0)));
        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 1], 0)));
        store.add_peer(info_hash, SocketAddr::from(([127, 0, 1, 3], 0)));

        let mut peers = store.get_random_peers(&info_hash).unwrap();
        peers.sort();

        assert_eq!(
            peers,
            vec![
                SocketAddr::from(([127, 0, 1, 1], 0)),
                SocketAddr::from(([127, 0, 1, 3], 0)),
            ]
        );
    }

    #[test]
    fn evicts_oldest_info_hash() {
        let mut store = store(1, 10);
        let info_hash_a = Id::random();
        let info_hash_b = Id::random();

        store.add_peer(info_hash_a, SocketAddr::from(([127, 0, 1, 1], 0)));
        store.add_peer(info_hash_b, SocketAddr::from(([127, 0, 2, 1], 0)));

        assert_eq!(store.get_random_peers(&info_hash_a), None);
        assert_eq!(
            store.get_random_peers(&info_hash_b),
            Some(vec![SocketAddr::from(([127, 0, 2, 1], 0))])
        );
    }

    #[test]
    fn random_subset_is_bounded() {
        let mut store = store(10, 100);
        let info_hash = Id::random();

        for port in 0..50 {
            store.add_peer(info_hash, SocketAddr::from(([127, 0, 0, 1], port)));
        }

        assert_eq!(
            store.get_random_peers(&info_hash).unwrap().len(),
            MAX_PEERS_RESPONSE
        );
    }
}
