mod test_join_room;
mod test_new_peer_offer;
mod test_stale_link;
