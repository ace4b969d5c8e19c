//! AudioCapabilityAction: one-shot audio format negotiation against a single
//! peer, typically the audio system at address 5.
//!
//! The action sends a single capability request carrying the fixed candidate
//! list and waits for one reply under one timer.  There are no retries: any
//! terminal condition (reply, rejection, empty payload, nack, timeout)
//! resolves the run to a full per-candidate support table, falling back to
//! the baseline LPCM profile when no usable payload exists.  A successful
//! payload is memoised process-wide so later runs complete without bus
//! traffic.

use cec_core::{
    AudioFormat, CecFrame, CodecSupport, LogicalAddress, Opcode, ShortAudioDescriptor,
    CANDIDATE_FORMATS,
};
use tracing::{debug, info, warn};

use crate::application::action::{
    ActionContext, ActionKind, ActionStatus, Consumed, FeatureAction, SendResult, TimerToken,
};
use crate::application::discovery::STAGE_TIMEOUT;
use crate::application::scheduler::EngineEvent;

/// Outcome of a finished negotiation, one entry per candidate format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCapabilityResult {
    pub codecs: Vec<CodecSupport>,
    /// The raw descriptor block the table was derived from; empty when the
    /// baseline fallback applied.
    pub raw_descriptors: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegotiationState {
    Idle,
    WaitingForReply,
    Done,
}

/// See the module docs.
pub struct AudioCapabilityAction {
    target: LogicalAddress,
    state: NegotiationState,
}

impl AudioCapabilityAction {
    pub fn new(target: LogicalAddress) -> Self {
        AudioCapabilityAction {
            target,
            state: NegotiationState::Idle,
        }
    }

    fn timer_token(&self) -> TimerToken {
        TimerToken {
            kind: ActionKind::AudioCapability,
            stage: 0,
            peer: self.target,
        }
    }

    /// Resolves the run: synthesizes the support table from `raw` (baseline
    /// LPCM only when `raw` is `None`), persists the flattened form, and
    /// emits the result.
    fn finish_with(&mut self, cx: &mut ActionContext<'_>, raw: Option<Vec<u8>>) -> ActionStatus {
        self.state = NegotiationState::Done;

        let codecs: Vec<CodecSupport> = CANDIDATE_FORMATS
            .iter()
            .map(|&format| match &raw {
                Some(payload) => match ShortAudioDescriptor::find_for_format(payload, format) {
                    Some(sad) => CodecSupport::from_descriptor(format, sad),
                    None => CodecSupport::unsupported(format),
                },
                None if format == AudioFormat::Lpcm => CodecSupport::baseline_lpcm(),
                None => CodecSupport::unsupported(format),
            })
            .collect();

        let flattened = flatten_capabilities(&codecs);
        if let Err(e) = cx.store.persist_audio_capability(&flattened) {
            warn!("negotiated audio capability not persisted: {e}");
        }

        let result = AudioCapabilityResult {
            codecs,
            raw_descriptors: raw.unwrap_or_default(),
        };
        info!(
            "audio negotiation with {} finished: {} of {} formats supported",
            self.target,
            result.codecs.iter().filter(|c| c.supported).count(),
            CANDIDATE_FORMATS.len()
        );
        cx.emit(EngineEvent::AudioCapabilityNegotiated(result));
        ActionStatus::Finished
    }
}

impl FeatureAction for AudioCapabilityAction {
    fn kind(&self) -> ActionKind {
        ActionKind::AudioCapability
    }

    fn start(&mut self, cx: &mut ActionContext<'_>) -> ActionStatus {
        debug_assert_eq!(self.state, NegotiationState::Idle);

        // A previous run already negotiated: reuse the memo, no bus traffic.
        if let Some(memo) = cx.negotiated_audio.clone() {
            debug!("reusing memoised audio capability payload");
            return self.finish_with(cx, Some(memo));
        }

        match CecFrame::request_short_audio_descriptor(
            cx.local_address,
            self.target,
            &CANDIDATE_FORMATS,
        ) {
            Ok(request) => {
                cx.transport.send(request);
                cx.timers.arm(self.timer_token(), STAGE_TIMEOUT);
                self.state = NegotiationState::WaitingForReply;
                ActionStatus::Running
            }
            Err(e) => {
                warn!("capability request not encodable: {e}");
                self.finish_with(cx, None)
            }
        }
    }

    fn process_frame(
        &mut self,
        cx: &mut ActionContext<'_>,
        frame: &CecFrame,
    ) -> (Consumed, ActionStatus) {
        if self.state != NegotiationState::WaitingForReply
            || frame.source() != self.target
            || frame.destination() != cx.local_address
        {
            return (Consumed::No, ActionStatus::Running);
        }

        if frame.is_feature_abort_for(Opcode::RequestShortAudioDescriptor) {
            debug!("{} rejected the capability request", self.target);
            cx.timers.cancel(&self.timer_token());
            return (Consumed::Yes, self.finish_with(cx, None));
        }
        if frame.opcode() != Opcode::ReportShortAudioDescriptor {
            return (Consumed::No, ActionStatus::Running);
        }

        cx.timers.cancel(&self.timer_token());
        if frame.params().is_empty() {
            // An empty report carries no capability, same outcome as an
            // explicit rejection.  Not memoised.
            debug!("{} reported no descriptors", self.target);
            return (Consumed::Yes, self.finish_with(cx, None));
        }

        let payload = frame.params().to_vec();
        *cx.negotiated_audio = Some(payload.clone());
        (Consumed::Yes, self.finish_with(cx, Some(payload)))
    }

    fn handle_timer(&mut self, cx: &mut ActionContext<'_>, token: &TimerToken) -> ActionStatus {
        if self.state != NegotiationState::WaitingForReply || *token != self.timer_token() {
            return ActionStatus::Running;
        }
        debug!("capability request to {} timed out", self.target);
        let memo = cx.negotiated_audio.clone();
        self.finish_with(cx, memo)
    }

    fn on_send_result(
        &mut self,
        cx: &mut ActionContext<'_>,
        opcode: Opcode,
        result: SendResult,
    ) -> ActionStatus {
        if self.state != NegotiationState::WaitingForReply
            || opcode != Opcode::RequestShortAudioDescriptor
            || result != SendResult::Nack
        {
            return ActionStatus::Running;
        }
        debug!("{} nacked the capability request", self.target);
        cx.timers.cancel(&self.timer_token());
        self.finish_with(cx, None)
    }

    fn cancel(&mut self, cx: &mut ActionContext<'_>) {
        if self.state == NegotiationState::WaitingForReply {
            cx.timers.cancel(&self.timer_token());
        }
        self.state = NegotiationState::Done;
        debug!("audio negotiation cancelled");
    }
}

/// Flattens a support table as `code:supported:channels:rate_mask:bitrate`
/// records joined by `;`, the form the capability store persists.
pub fn flatten_capabilities(codecs: &[CodecSupport]) -> String {
    codecs
        .iter()
        .map(|c| {
            format!(
                "{}:{}:{}:{}:{}",
                c.format as u8,
                u8::from(c.supported),
                c.max_channels,
                c.sample_rate_mask,
                c.bitrate_byte
            )
        })
        .collect::<Vec<_>>()
        .join(";")
}
