use crate::peer::types::IceCandidate;
use std::collections::{HashSet, VecDeque};

/// Что делать с только что увиденным удалённым кандидатом
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Remote description уже применён, отдать в Transport сейчас
    Apply(IceCandidate),
    /// Отложен до применения remote description
    Buffered,
    /// Этот номер уже был (повторная доставка после переподключения)
    Duplicate,
}

/// Очередь удалённых кандидатов, закрытая до установки remote description.
///
/// Кандидаты до открытия сохраняются в порядке прихода и отдаются одним
/// пакетом в [`CandidateBuffer::open`]; после открытия каждый кандидат
/// применяется сразу. Повторы по `sequence` отбрасываются.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: VecDeque<IceCandidate>,
    remote_applied: bool,
    seen: HashSet<u64>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sequence: u64, candidate: IceCandidate) -> Admission {
        if !self.seen.insert(sequence) {
            return Admission::Duplicate;
        }
        if self.remote_applied {
            Admission::Apply(candidate)
        } else {
            self.pending.push_back(candidate);
            Admission::Buffered
        }
    }

    /// Открывает шлюз и возвращает отложенные кандидаты в порядке прихода.
    /// Повторный вызов ничего не возвращает.
    pub fn open(&mut self) -> Vec<IceCandidate> {
        self.remote_applied = true;
        self.pending.drain(..).collect()
    }

    pub fn is_open(&self) -> bool {
        self.remote_applied
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(n: u64) -> IceCandidate {
        IceCandidate::new(format!("candidate:{n} 1 udp 1 10.0.0.{n} 9 typ host"))
    }

    #[test]
    fn candidates_before_open_are_replayed_in_arrival_order() {
        let mut buf = CandidateBuffer::new();
        // приходят не по порядку номеров: порядок прихода важнее
        for seq in [2, 0, 1] {
            assert_eq!(buf.observe(seq, cand(seq)), Admission::Buffered);
        }
        assert_eq!(buf.pending_len(), 3);
        assert_eq!(buf.open(), vec![cand(2), cand(0), cand(1)]);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn candidates_after_open_apply_immediately() {
        let mut buf = CandidateBuffer::new();
        assert!(buf.open().is_empty());
        assert!(buf.is_open());
        assert_eq!(buf.observe(0, cand(0)), Admission::Apply(cand(0)));
        assert_eq!(buf.observe(1, cand(1)), Admission::Apply(cand(1)));
    }

    #[test]
    fn redelivered_candidates_are_not_duplicated() {
        let mut buf = CandidateBuffer::new();
        buf.observe(0, cand(0));
        buf.observe(1, cand(1));
        assert_eq!(buf.observe(0, cand(0)), Admission::Duplicate);
        assert_eq!(buf.open(), vec![cand(0), cand(1)]);
        assert_eq!(buf.observe(1, cand(1)), Admission::Duplicate);
        assert_eq!(buf.observe(2, cand(2)), Admission::Apply(cand(2)));
    }

    #[test]
    fn second_open_replays_nothing() {
        let mut buf = CandidateBuffer::new();
        buf.observe(0, cand(0));
        assert_eq!(buf.open().len(), 1);
        assert!(buf.open().is_empty());
    }

    #[test]
    fn many_buffered_candidates_keep_order_without_loss() {
        let mut buf = CandidateBuffer::new();
        let n = 200;
        for seq in 0..n {
            buf.observe(seq, cand(seq));
        }
        let replayed = buf.open();
        assert_eq!(replayed.len(), n as usize);
        assert!(replayed.iter().zip(0..n).all(|(c, seq)| *c == cand(seq)));
    }
}
