//! The public session facade: [`Params`], [`Session`], and its
//! `start`/`send_record`/`receive_data`/`verify_datagram`/`force_kex`/`stop`
//! entry points.

use crate::core::{
    Logger, SigningKey, SigningPublicKey, SptpsError, StderrLogger, RECORD_TYPE_APPLICATION_LIMIT,
    RECORD_TYPE_HANDSHAKE,
};
use crate::core::DiffieHellman;
use crate::crypto::{
    init_cipher, key_half_for, CipherContext, EphemeralKeypair, KeyMaterial, ReplayWindow,
};
use crate::framer::{build_datagram_record, build_stream_record, decode_datagram_record, StreamReassembler};
use crate::handshake::{
    compute_shared_secret, derive_keys, local_suite_mask, negotiate_suite, sign_sig, verify_sig,
    HandshakeState, KexRecord,
};

/// Configuration for [`Session::start`].
pub struct Params<K, V> {
    /// `true` if this side originated the session.
    pub initiator: bool,
    /// `true` for datagram framing, `false` for stream framing.
    pub datagram: bool,
    /// This side's long-term signing keypair.
    pub my_key: K,
    /// The peer's long-term signing public key, known out-of-band.
    pub peer_key: V,
    /// Domain-separation label; must match on both sides.
    pub label: Vec<u8>,
    /// Locally supported cipher suite bitmask. `0` means "every suite
    /// this build implements".
    pub cipher_suites: u16,
    /// Locally preferred cipher suite id.
    pub preferred_suite: u8,
    /// Replay window size in bytes for datagram mode (`0` disables
    /// replay checking).
    pub replaywin: usize,
    /// Label used in log lines, identifying this session to a human.
    pub session_label: String,
    /// Log sink. Defaults to [`StderrLogger`] via [`Params::new`].
    pub logger: Box<dyn Logger>,
}

impl<K, V> Params<K, V> {
    /// Builds a `Params` with the common defaults: every supported
    /// cipher suite, ChaCha20-Poly1305 preferred, the default replay
    /// window, and a stderr logger.
    pub fn new(initiator: bool, datagram: bool, my_key: K, peer_key: V, label: Vec<u8>) -> Self {
        Self {
            initiator,
            datagram,
            my_key,
            peer_key,
            label,
            cipher_suites: 0,
            preferred_suite: crate::core::SUITE_CHACHA20_POLY1305,
            replaywin: crate::core::DEFAULT_REPLAY_WINDOW,
            session_label: String::new(),
            logger: Box::new(StderrLogger),
        }
    }
}

/// A running SPTPS session.
///
/// All entry points are synchronous and must be called from a single
/// thread; the session performs no internal locking. `send_data` and
/// `receive_record` are invoked synchronously from within these calls and
/// must not call back into the session that invoked them.
pub struct Session<K, V> {
    initiator: bool,
    datagram: bool,
    state: HandshakeState,
    instate: bool,
    outstate: bool,

    my_key: K,
    peer_key: V,

    ecdh: Option<EphemeralKeypair>,
    my_kex: Option<KexRecord>,
    peer_kex: Option<KexRecord>,
    key_material: Option<KeyMaterial>,

    incipher: Option<Box<dyn CipherContext>>,
    outcipher: Option<Box<dyn CipherContext>>,

    cipher_suites: u16,
    preferred_suite: u8,
    cipher_suite: Option<u8>,

    label: Vec<u8>,

    inseqno: u32,
    outseqno: u32,
    replay: ReplayWindow,
    received: u64,

    reassembler: StreamReassembler,

    send_data: Box<dyn FnMut(u8, &[u8]) -> bool>,
    receive_record: Box<dyn FnMut(u8, &[u8]) -> bool>,

    logger: Box<dyn Logger>,
    session_label: String,
}

impl<K: SigningKey, V: SigningPublicKey> Session<K, V> {
    /// Starts a new session: captures `params`, generates the first
    /// ephemeral keypair, and immediately sends the first KEX.
    pub fn start(
        params: Params<K, V>,
        send_data: impl FnMut(u8, &[u8]) -> bool + 'static,
        receive_record: impl FnMut(u8, &[u8]) -> bool + 'static,
    ) -> Result<Self, SptpsError> {
        let cipher_suites = local_suite_mask(params.cipher_suites);
        let mut session = Session {
            initiator: params.initiator,
            datagram: params.datagram,
            state: HandshakeState::Kex,
            instate: false,
            outstate: false,
            my_key: params.my_key,
            peer_key: params.peer_key,
            ecdh: None,
            my_kex: None,
            peer_kex: None,
            key_material: None,
            incipher: None,
            outcipher: None,
            cipher_suites,
            preferred_suite: params.preferred_suite,
            cipher_suite: None,
            label: params.label,
            inseqno: 0,
            outseqno: 0,
            replay: ReplayWindow::new(params.replaywin),
            received: 0,
            reassembler: StreamReassembler::new(),
            send_data: Box::new(send_data),
            receive_record: Box::new(receive_record),
            logger: params.logger,
            session_label: params.session_label,
        };
        session.send_kex()?;
        Ok(session)
    }

    /// Tears the session down. There is no reset-in-place; a failed or
    /// finished session must be dropped and, if needed, a new one
    /// started.
    pub fn stop(self) {
        // Dropping releases every buffer and zeroizes key material via
        // their own `Drop` impls; nothing further to do here.
    }

    /// `true` once the handshake has completed and outbound traffic is
    /// keyed.
    pub fn is_established(&self) -> bool {
        self.outstate && self.instate
    }

    /// Post-handshake received-record counter. Resets to `0` whenever
    /// `inseqno` wraps to exactly `0`, otherwise increments on every
    /// accepted datagram.
    pub fn received(&self) -> u64 {
        self.received
    }

    fn send_kex(&mut self) -> Result<(), SptpsError> {
        let ecdh = EphemeralKeypair::generate();
        let kex = KexRecord::build(self.preferred_suite, self.cipher_suites, ecdh.public_bytes());
        self.ecdh = Some(ecdh);
        self.send_handshake_record(&kex.raw)?;
        self.my_kex = Some(kex);
        Ok(())
    }

    fn send_handshake_record(&mut self, payload: &[u8]) -> Result<(), SptpsError> {
        self.send_raw_record(RECORD_TYPE_HANDSHAKE, payload)
    }

    fn send_raw_record(&mut self, record_type: u8, payload: &[u8]) -> Result<(), SptpsError> {
        let cipher = self.outcipher.as_deref();
        let frame = if self.datagram {
            build_datagram_record(record_type, payload, self.outseqno, cipher)?
        } else {
            build_stream_record(record_type, payload, self.outseqno, cipher)?
        };
        self.outseqno = self.outseqno.wrapping_add(1);
        if !(self.send_data)(record_type, &frame) {
            self.logger.error(&self.session_label, "send_data callback returned false");
            return Err(SptpsError::CallbackFailed);
        }
        Ok(())
    }

    /// Sends an application record. Requires the handshake to have
    /// completed and `record_type` to be in the application range.
    pub fn send_record(&mut self, record_type: u8, payload: &[u8]) -> Result<(), SptpsError> {
        if !self.outstate {
            return Err(SptpsError::InvalidState("send_record before handshake completes"));
        }
        if record_type >= RECORD_TYPE_APPLICATION_LIMIT {
            return Err(SptpsError::InvalidRecordType(record_type));
        }
        self.send_raw_record(record_type, payload)
    }

    /// Explicitly triggers a rekey. Only legal once the steady state has
    /// been reached after the initial handshake.
    pub fn force_kex(&mut self) -> Result<(), SptpsError> {
        if self.state != HandshakeState::SecondaryKex || !self.outstate {
            return Err(SptpsError::InvalidState("force_kex outside steady state"));
        }
        self.state = HandshakeState::Kex;
        self.send_kex()
    }

    /// Feeds received bytes into the session. In stream mode, `data` may
    /// be an arbitrary chunk of a larger record and this may be called
    /// repeatedly; the return value is the number of bytes consumed. In
    /// datagram mode, `data` must hold exactly one record.
    pub fn receive_data(&mut self, data: &[u8]) -> Result<usize, SptpsError> {
        if self.datagram {
            self.receive_datagram(data, true)?;
            Ok(data.len())
        } else {
            self.receive_stream(data)
        }
    }

    /// Checks a datagram's sequence number and AEAD tag without
    /// delivering it or updating replay state. Useful as a cheap
    /// early-reject in hot paths.
    ///
    /// This checks the sequence number first (without mutating replay
    /// state) and only then the AEAD tag — the reverse order from the
    /// full receive path, which decrypts first and folds the result into
    /// replay state only on success.
    pub fn verify_datagram(&mut self, data: &[u8]) -> Result<(), SptpsError> {
        if !self.instate {
            return Err(SptpsError::InvalidState("verify_datagram before handshake completes"));
        }
        if data.len() < crate::core::DATAGRAM_HEADER_SIZE {
            return Err(SptpsError::ShortPacket {
                needed: crate::core::DATAGRAM_HEADER_SIZE,
                got: data.len(),
            });
        }
        let seqno = u32::from_le_bytes(data[..4].try_into().unwrap());
        self.replay.check(self.inseqno, seqno, false)?;
        let (_, _decoded) = decode_datagram_record(data, self.incipher.as_deref())?;
        Ok(())
    }

    fn receive_stream(&mut self, data: &[u8]) -> Result<usize, SptpsError> {
        let mut offset = 0;
        while offset < data.len() {
            let (consumed, body) = self.reassembler.feed(&data[offset..]);
            offset += consumed;
            let body = match body {
                Some(body) => body,
                None => break,
            };
            // The cipher is re-read fresh for every record: a handshake
            // cutover can land between two records delivered in the same
            // chunk, so a cipher snapshotted once per `receive_data` call
            // would decrypt a post-cutover record with the old key.
            let plain = match self.incipher.as_deref() {
                Some(cipher) => cipher.decrypt(self.inseqno, &body).map_err(|e| {
                    self.logger.error(&self.session_label, &format!("decrypt failed: {e}"));
                    e
                })?,
                None => body,
            };
            let decoded = crate::framer::split_record_body(&plain)?;
            self.inseqno = self.inseqno.wrapping_add(1);
            self.dispatch_record(decoded.record_type, &decoded.payload)?;
        }
        Ok(offset)
    }

    fn receive_datagram(&mut self, data: &[u8], update_state: bool) -> Result<(), SptpsError> {
        if data.len() < crate::core::DATAGRAM_HEADER_SIZE {
            return Err(SptpsError::ShortPacket {
                needed: crate::core::DATAGRAM_HEADER_SIZE,
                got: data.len(),
            });
        }

        if !self.instate {
            // Before the handshake completes, the datagram path requires
            // an exact sequence match (no window yet) and advances
            // inseqno by exactly one.
            let seqno = u32::from_le_bytes(data[..4].try_into().unwrap());
            if seqno != self.inseqno {
                return Err(SptpsError::LateOrReplay);
            }
            let (_, decoded) = decode_datagram_record(data, None)?;
            self.inseqno = self.inseqno.wrapping_add(1);
            self.dispatch_record(decoded.record_type, &decoded.payload)?;
            return Ok(());
        }

        let (seqno, decoded) = decode_datagram_record(data, self.incipher.as_deref()).map_err(|e| {
            self.logger.error(&self.session_label, &format!("datagram decode failed: {e}"));
            e
        })?;
        let accepted = self.replay.check(self.inseqno, seqno, update_state).map_err(|e| {
            self.logger.warning(&self.session_label, &format!("replay check rejected seqno {seqno}: {e}"));
            e
        })?;
        if update_state {
            self.inseqno = accepted.new_inseqno;
            if self.inseqno == 0 {
                self.received = 0;
            } else {
                self.received += 1;
            }
        }
        self.dispatch_record(decoded.record_type, &decoded.payload)
    }

    fn dispatch_record(&mut self, record_type: u8, payload: &[u8]) -> Result<(), SptpsError> {
        if record_type == RECORD_TYPE_HANDSHAKE {
            self.handle_handshake_record(payload)
        } else if record_type < RECORD_TYPE_APPLICATION_LIMIT {
            if !self.instate {
                return Err(SptpsError::InvalidRecordType(record_type));
            }
            if !(self.receive_record)(record_type, payload) {
                self.logger.error(&self.session_label, "receive_record callback returned false");
                return Err(SptpsError::CallbackFailed);
            }
            Ok(())
        } else {
            self.logger.warning(&self.session_label, &format!("rejected out-of-range record type {record_type}"));
            Err(SptpsError::InvalidRecordType(record_type))
        }
    }

    fn handle_handshake_record(&mut self, payload: &[u8]) -> Result<(), SptpsError> {
        match self.state {
            HandshakeState::Kex => self.on_kex(payload),
            HandshakeState::Sig => self.on_sig(payload),
            HandshakeState::Ack => self.on_ack(payload),
            HandshakeState::SecondaryKex => {
                // A handshake record here starts a new round: send our
                // own KEX, then process the received one as if we were
                // in the KEX state.
                self.state = HandshakeState::Kex;
                self.send_kex()?;
                self.on_kex(payload)
            }
        }
    }

    fn on_kex(&mut self, payload: &[u8]) -> Result<(), SptpsError> {
        if self.peer_kex.is_some() {
            self.logger.warning(&self.session_label, "received a second KEX for the same round");
            return Err(SptpsError::DuplicateKex);
        }
        let peer_kex = KexRecord::parse(payload)?;
        let suite = negotiate_suite(
            self.cipher_suites,
            self.preferred_suite,
            peer_kex.suites,
            peer_kex.preferred_suite,
        )?;
        self.cipher_suite = Some(suite);

        let ecdh = self.ecdh.take().ok_or(SptpsError::EcdhFailed)?;
        let shared_secret = compute_shared_secret(ecdh, &peer_kex)?;

        let my_kex = self.my_kex.as_ref().ok_or(SptpsError::EcdhFailed)?;
        let (initiator_kex, responder_kex) = if self.initiator {
            (my_kex.raw.as_slice(), peer_kex.raw.as_slice())
        } else {
            (peer_kex.raw.as_slice(), my_kex.raw.as_slice())
        };
        let material = derive_keys(&shared_secret, initiator_kex, responder_kex, &self.label)?;
        self.key_material = Some(KeyMaterial::from_bytes(material));
        self.peer_kex = Some(peer_kex);

        // Only the initiator replies to a KEX with its own SIG right away;
        // the responder waits until it has the initiator's SIG to verify,
        // and sends its own from `on_sig` instead.
        if self.initiator {
            self.send_sig()?;
        }
        self.state = HandshakeState::Sig;
        Ok(())
    }

    fn send_sig(&mut self) -> Result<(), SptpsError> {
        let my_kex = self.my_kex.as_ref().ok_or(SptpsError::EcdhFailed)?;
        let peer_kex = self.peer_kex.as_ref().ok_or(SptpsError::EcdhFailed)?;
        let sig = sign_sig(&self.my_key, self.initiator, &my_kex.raw, &peer_kex.raw, &self.label);
        self.send_handshake_record(&sig)
    }

    fn on_sig(&mut self, payload: &[u8]) -> Result<(), SptpsError> {
        let my_kex = self.my_kex.as_ref().ok_or(SptpsError::EcdhFailed)?;
        let peer_kex = self.peer_kex.as_ref().ok_or(SptpsError::EcdhFailed)?;
        verify_sig(&self.peer_key, self.initiator, &my_kex.raw, &peer_kex.raw, &self.label, payload).map_err(|e| {
            self.logger.error(&self.session_label, &format!("peer signature did not verify: {e}"));
            e
        })?;

        // The responder hasn't sent its own SIG yet; do it now that the
        // initiator's has verified.
        if !self.initiator {
            self.send_sig()?;
        }

        let rekey = self.outstate;
        self.install_outbound_cipher()?;
        self.install_inbound_cipher()?;
        self.outstate = true;

        if rekey {
            // A secondary (rekey) round: cut over on an explicit ACK
            // round-trip rather than declaring the new keys live on the
            // spot, so both sides agree on the exact record where they
            // take effect.
            self.send_handshake_record(&[])?;
            self.state = HandshakeState::Ack;
        } else {
            // Primary handshake: the inbound cipher install above stands
            // in for the ACK, no wire record needed.
            self.notify_handshake_complete()?;
            self.state = HandshakeState::SecondaryKex;
        }
        Ok(())
    }

    fn on_ack(&mut self, payload: &[u8]) -> Result<(), SptpsError> {
        if !payload.is_empty() {
            return Err(SptpsError::BadLength {
                expected: 0,
                actual: payload.len(),
            });
        }
        self.notify_handshake_complete()?;
        self.state = HandshakeState::SecondaryKex;
        Ok(())
    }

    fn install_outbound_cipher(&mut self) -> Result<(), SptpsError> {
        let suite = self.cipher_suite.ok_or(SptpsError::NoCommonSuite)?;
        let key_material = self.key_material.as_ref().ok_or(SptpsError::PrfFailed)?;
        let half = key_half_for(self.initiator, true);
        self.outcipher = Some(init_cipher(suite, &key_material.0, half)?);
        Ok(())
    }

    fn install_inbound_cipher(&mut self) -> Result<(), SptpsError> {
        let suite = self.cipher_suite.ok_or(SptpsError::NoCommonSuite)?;
        let key_material = self.key_material.as_ref().ok_or(SptpsError::PrfFailed)?;
        let half = key_half_for(self.initiator, false);
        self.incipher = Some(init_cipher(suite, &key_material.0, half)?);
        self.instate = true;
        self.key_material = None;
        self.peer_kex = None;
        self.my_kex = None;
        // inseqno/outseqno are session-lifetime monotonic; they are never
        // reset here, only the replay window, which is indexed relative to
        // inseqno rather than a reason to reset it.
        self.replay = ReplayWindow::new(self.replay.len());
        Ok(())
    }

    fn notify_handshake_complete(&mut self) -> Result<(), SptpsError> {
        if !(self.receive_record)(RECORD_TYPE_HANDSHAKE, &[]) {
            return Err(SptpsError::CallbackFailed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{StaticSigningKeypair, StaticVerifyingKey};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type TestSession = Session<StaticSigningKeypair, StaticVerifyingKey>;
    type Queue = Rc<RefCell<VecDeque<Vec<u8>>>>;
    type Log = Rc<RefCell<Vec<(u8, Vec<u8>)>>>;

    struct Harness {
        a: TestSession,
        b: TestSession,
        wire_a_to_b: Queue,
        wire_b_to_a: Queue,
        received_by_a: Log,
        received_by_b: Log,
    }

    impl Harness {
        /// Alternately drains both outbound queues into the other side's
        /// `receive_data` until neither side has anything left to send.
        fn pump(&mut self) {
            loop {
                let mut progressed = false;
                while let Some(frame) = self.wire_a_to_b.borrow_mut().pop_front() {
                    self.b.receive_data(&frame).unwrap();
                    progressed = true;
                }
                while let Some(frame) = self.wire_b_to_a.borrow_mut().pop_front() {
                    self.a.receive_data(&frame).unwrap();
                    progressed = true;
                }
                if !progressed {
                    break;
                }
            }
        }
    }

    fn make_pair(datagram: bool) -> Harness {
        let a_key = StaticSigningKeypair::generate();
        let b_key = StaticSigningKeypair::generate();
        let a_pub = a_key.public_key();
        let b_pub = b_key.public_key();

        let wire_a_to_b: Queue = Rc::new(RefCell::new(VecDeque::new()));
        let wire_b_to_a: Queue = Rc::new(RefCell::new(VecDeque::new()));
        let received_by_a: Log = Rc::new(RefCell::new(Vec::new()));
        let received_by_b: Log = Rc::new(RefCell::new(Vec::new()));

        let mut params_a = Params::new(true, datagram, a_key, b_pub, b"test".to_vec());
        params_a.logger = Box::new(crate::core::QuietLogger);
        let mut params_b = Params::new(false, datagram, b_key, a_pub, b"test".to_vec());
        params_b.logger = Box::new(crate::core::QuietLogger);

        let send_a = wire_a_to_b.clone();
        let recv_a = received_by_a.clone();
        let a = Session::start(
            params_a,
            move |_t, d| {
                send_a.borrow_mut().push_back(d.to_vec());
                true
            },
            move |t, d| {
                recv_a.borrow_mut().push((t, d.to_vec()));
                true
            },
        )
        .unwrap();

        let send_b = wire_b_to_a.clone();
        let recv_b = received_by_b.clone();
        let b = Session::start(
            params_b,
            move |_t, d| {
                send_b.borrow_mut().push_back(d.to_vec());
                true
            },
            move |t, d| {
                recv_b.borrow_mut().push((t, d.to_vec()));
                true
            },
        )
        .unwrap();

        Harness {
            a,
            b,
            wire_a_to_b,
            wire_b_to_a,
            received_by_a,
            received_by_b,
        }
    }

    #[test]
    fn stream_handshake_and_application_record_roundtrip() {
        let mut h = make_pair(false);
        assert!(!h.a.is_established());
        assert!(!h.b.is_established());

        h.pump();

        assert!(h.a.is_established());
        assert!(h.b.is_established());
        // Both sides see the empty handshake-complete notification.
        assert!(h.received_by_a.borrow().iter().any(|(t, _)| *t == RECORD_TYPE_HANDSHAKE));
        assert!(h.received_by_b.borrow().iter().any(|(t, _)| *t == RECORD_TYPE_HANDSHAKE));

        h.a.send_record(5, b"hello from a").unwrap();
        h.pump();
        assert!(h
            .received_by_b
            .borrow()
            .iter()
            .any(|(t, d)| *t == 5 && d == b"hello from a"));

        h.b.send_record(7, b"hello from b").unwrap();
        h.pump();
        assert!(h
            .received_by_a
            .borrow()
            .iter()
            .any(|(t, d)| *t == 7 && d == b"hello from b"));
    }

    #[test]
    fn datagram_handshake_and_application_record_roundtrip() {
        let mut h = make_pair(true);
        h.pump();
        assert!(h.a.is_established());
        assert!(h.b.is_established());

        h.a.send_record(1, b"ping").unwrap();
        h.pump();
        assert!(h
            .received_by_b
            .borrow()
            .iter()
            .any(|(t, d)| *t == 1 && d == b"ping"));
    }

    #[test]
    fn forced_rekey_completes_and_traffic_still_flows() {
        let mut h = make_pair(false);
        h.pump();
        assert!(h.a.is_established());

        h.a.force_kex().unwrap();
        h.pump();

        h.a.send_record(2, b"post-rekey").unwrap();
        h.pump();
        assert!(h
            .received_by_b
            .borrow()
            .iter()
            .any(|(t, d)| *t == 2 && d == b"post-rekey"));
    }

    #[test]
    fn received_counter_resets_when_inseqno_wraps_to_zero() {
        let mut h = make_pair(true);
        h.pump();

        h.a.send_record(3, b"before wrap").unwrap();
        h.pump();
        assert_eq!(h.b.received(), 1);

        // Force both sides to the seqno just before a u32 wrap, bypassing
        // the need to actually send 2^32 records.
        h.a.outseqno = u32::MAX;
        h.b.inseqno = u32::MAX;

        h.a.send_record(3, b"at wrap").unwrap();
        h.pump();

        assert_eq!(h.b.inseqno, 0);
        assert_eq!(h.b.received(), 0);
    }

    #[test]
    fn send_record_before_handshake_completes_is_rejected() {
        let mut h = make_pair(false);
        assert!(matches!(
            h.a.send_record(1, b"too early"),
            Err(SptpsError::InvalidState(_))
        ));
    }

    #[test]
    fn force_kex_before_steady_state_is_rejected() {
        let mut h = make_pair(false);
        assert!(matches!(
            h.a.force_kex(),
            Err(SptpsError::InvalidState(_))
        ));
    }
}
