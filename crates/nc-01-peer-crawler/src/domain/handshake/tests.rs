use super::*;

fn config() -> HandshakeConfig {
    HandshakeConfig::for_network(1, [0xAB; 32])
}

fn status_from(identity: &LocalIdentity, config: &HandshakeConfig) -> StatusMessage {
    StatusMessage::local(identity, config, Some(30303), &[])
}

// =========================================================================
// TEST GROUP 1: Network Matching
// =========================================================================

#[test]
fn test_matching_status_accepted() {
    let ours = config();
    let theirs = status_from(&LocalIdentity::generate(), &ours);
    assert_eq!(verify_status(&ours, &theirs), Ok(()));
}

#[test]
fn test_wrong_network_id_rejected() {
    let ours = config();
    let mut theirs = status_from(&LocalIdentity::generate(), &ours);
    theirs.network_id = 5;
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::NetworkIdMismatch));
}

#[test]
fn test_wrong_genesis_rejected() {
    let ours = config();
    let mut theirs = status_from(&LocalIdentity::generate(), &ours);
    theirs.genesis_hash = hex::encode([0xCD; 32]);
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::GenesisMismatch));

    theirs.genesis_hash = "not-hex".into();
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::GenesisMismatch));
}

// =========================================================================
// TEST GROUP 2: Protocol Version
// =========================================================================

#[test]
fn test_protocol_range() {
    let ours = config();
    let mut theirs = status_from(&LocalIdentity::generate(), &ours);

    theirs.protocol_version = ours.min_protocol_version - 1;
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::ProtocolMismatch));

    theirs.protocol_version = ours.max_protocol_version + 1;
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::ProtocolMismatch));

    theirs.protocol_version = ours.min_protocol_version;
    assert_eq!(verify_status(&ours, &theirs), Ok(()));
}

// =========================================================================
// TEST GROUP 3: Fork ID
// =========================================================================

#[test]
fn test_fork_id_compatibility() {
    let ours = ForkId::new([0xDE, 0xAD, 0xBE, 0xEF], 1000);

    assert!(is_fork_compatible(&ours, &ForkId::new([0xDE, 0xAD, 0xBE, 0xEF], 1000), 500));
    assert!(!is_fork_compatible(&ours, &ForkId::new([0xCA, 0xFE, 0xBA, 0xBE], 1000), 500));
    assert!(is_fork_compatible(&ours, &ForkId::new([0xDE, 0xAD, 0xBE, 0xEF], 0), 500));
    // Their fork at 400 is already behind us.
    assert!(!is_fork_compatible(&ours, &ForkId::new([0xDE, 0xAD, 0xBE, 0xEF], 400), 500));
    assert!(is_fork_compatible(&ours, &ForkId::new([0xDE, 0xAD, 0xBE, 0xEF], 2000), 500));
}

#[test]
fn test_fork_divergence_rejected() {
    let mut ours = config();
    ours.fork_id = Some(ForkId::new([1, 2, 3, 4], 0));
    let mut theirs = status_from(&LocalIdentity::generate(), &ours);
    theirs.fork_id = Some(ForkId::new([9, 9, 9, 9], 0));
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::ForkDivergence));

    // A peer that does not advertise a fork id is not checked.
    theirs.fork_id = None;
    assert_eq!(verify_status(&ours, &theirs), Ok(()));
}

// =========================================================================
// TEST GROUP 4: Encoding
// =========================================================================

#[test]
fn test_invalid_public_key_rejected() {
    let ours = config();
    let mut theirs = status_from(&LocalIdentity::generate(), &ours);
    theirs.pubkey = "11".repeat(64);
    assert_eq!(verify_status(&ours, &theirs), Err(RejectReason::InvalidPublicKey));
}

#[test]
fn test_line_decodes_to_outcome() {
    let identity = LocalIdentity::generate();
    let neighbour = Candidate::new(
        NodeId::new([7; 32]),
        NodeAddr::new("10.0.0.7".parse().unwrap(), 30303),
    );
    let status = StatusMessage::local(&identity, &config(), Some(30311), &[neighbour.clone()]);

    let line = status.encode_line().unwrap();
    assert!(line.ends_with('\n'));
    let outcome = StatusMessage::decode_line(&line).unwrap().into_outcome().unwrap();

    assert_eq!(&outcome.public_key, identity.public_key());
    assert_eq!(outcome.listen_port, Some(30311));
    assert_eq!(outcome.metadata.network_id, 1);
    assert_eq!(outcome.metadata.genesis_hash, [0xAB; 32]);
    assert_eq!(outcome.metadata.capabilities, vec![Capability::new("eth", 68)]);
    assert_eq!(outcome.neighbours, vec![neighbour]);
}

#[test]
fn test_garbage_line_is_protocol_error() {
    assert!(matches!(StatusMessage::decode_line("{not json"), Err(ProbeError::Protocol(_))));

    let oversized = "x".repeat(MAX_STATUS_LINE + 1);
    assert!(matches!(StatusMessage::decode_line(&oversized), Err(ProbeError::Protocol(_))));
}

#[test]
fn test_undialable_neighbours_are_dropped() {
    let entry = NeighbourEntry {
        node_id: NodeId::new([1; 32]).to_hex(),
        ip: "0.0.0.0".parse().unwrap(),
        udp_port: 30303,
        tcp_port: None,
    };
    assert!(entry.to_candidate().is_none());

    let bad_id = NeighbourEntry {
        node_id: "zz".into(),
        ip: "10.0.0.1".parse().unwrap(),
        udp_port: 30303,
        tcp_port: None,
    };
    assert!(bad_id.to_candidate().is_none());
}

// =========================================================================
// TEST GROUP 5: Challenge
// =========================================================================

#[test]
fn test_answered_challenge_verifies() {
    let config = config();
    let dialer = LocalIdentity::generate();
    let listener = LocalIdentity::generate();
    let challenge = [0x5A; 32];

    let request = status_from(&dialer, &config).with_challenge(&challenge);
    let reply = status_from(&listener, &config)
        .answer_challenge(&listener, &request)
        .unwrap();
    let reply = StatusMessage::decode_line(&reply.encode_line().unwrap()).unwrap();

    assert_eq!(verify_challenge_response(&reply, &challenge), Ok(()));
    assert_eq!(
        verify_challenge_response(&reply, &[0x5B; 32]),
        Err(RejectReason::BadSignature)
    );
}

#[test]
fn test_unsigned_reply_rejected() {
    let config = config();
    let reply = status_from(&LocalIdentity::generate(), &config);

    assert!(reply.signature.is_none());
    assert_eq!(
        verify_challenge_response(&reply, &[1; 32]),
        Err(RejectReason::BadSignature)
    );
}

#[test]
fn test_reply_signed_by_other_key_rejected() {
    let config = config();
    let victim = LocalIdentity::generate();
    let attacker = LocalIdentity::generate();
    let challenge = [3; 32];
    let request = status_from(&LocalIdentity::generate(), &config).with_challenge(&challenge);

    // Victim's public key, attacker's signature.
    let forged = status_from(&victim, &config)
        .answer_challenge(&attacker, &request)
        .unwrap();

    assert_eq!(
        verify_challenge_response(&forged, &challenge),
        Err(RejectReason::BadSignature)
    );
}

#[test]
fn test_request_without_challenge_cannot_be_answered() {
    let config = config();
    let listener = LocalIdentity::generate();
    let mut request = status_from(&LocalIdentity::generate(), &config);
    assert!(matches!(
        status_from(&listener, &config).answer_challenge(&listener, &request),
        Err(ProbeError::Protocol(_))
    ));

    request.challenge = Some("abcd".into());
    assert!(matches!(
        status_from(&listener, &config).answer_challenge(&listener, &request),
        Err(ProbeError::Protocol(_))
    ));
}
