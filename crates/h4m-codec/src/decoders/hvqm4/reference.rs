//! 参考帧跟踪.
//!
//! 三个平面缓冲区组成固定的 arena, `past`/`present`/`future` 三个角色只记录
//! 缓冲区索引. 锚点帧 (I/P) 解码成功后轮转角色, 不复制任何像素数据.
//!
//! 解码顺序 I1 P2 B3 P4 的参考关系:
//! - P2 参考 I1
//! - B3 参考 I1 (past) 与 P2 (future)
//! - P4 参考 P2

use h4m_core::{H4mError, H4mResult};
use log::trace;

use crate::frame::PictureType;

use super::picture::{PictureReconstructor, PlanarBuffer};
use super::sequence::SequenceObject;

/// 参考帧角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// 较早的锚点帧
    Past,
    /// 当前输出缓冲区
    Present,
    /// 最近的锚点帧
    Future,
}

/// 三缓冲参考帧集合
#[derive(Debug)]
pub struct ReferenceSlots {
    slots: [PlanarBuffer; 3],
    past: usize,
    present: usize,
    future: usize,
    /// 已解码的锚点帧数量 (最多记到 2)
    anchors: usize,
}

impl ReferenceSlots {
    /// 按图像尺寸分配三个缓冲区
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            slots: [
                PlanarBuffer::new(width, height),
                PlanarBuffer::new(width, height),
                PlanarBuffer::new(width, height),
            ],
            past: 0,
            present: 1,
            future: 2,
            anchors: 0,
        }
    }

    /// 角色对应的缓冲区索引
    pub fn slot_index(&self, role: SlotRole) -> usize {
        match role {
            SlotRole::Past => self.past,
            SlotRole::Present => self.present,
            SlotRole::Future => self.future,
        }
    }

    /// 角色对应的缓冲区
    pub fn buffer(&self, role: SlotRole) -> &PlanarBuffer {
        &self.slots[self.slot_index(role)]
    }

    /// 按索引读取缓冲区
    pub fn slot(&self, index: usize) -> Option<&PlanarBuffer> {
        self.slots.get(index)
    }

    /// 已解码的锚点帧数量
    pub fn anchor_count(&self) -> usize {
        self.anchors
    }

    /// 当前是否有足够的参考帧解码该类型
    pub fn can_decode(&self, picture_type: PictureType) -> bool {
        self.anchors >= picture_type.reference_count()
    }

    /// 丢弃所有参考帧 (seek 或 flush 之后)
    pub fn reset(&mut self) {
        self.past = 0;
        self.present = 1;
        self.future = 2;
        self.anchors = 0;
    }

    /// 解码一帧并返回输出缓冲区的索引
    ///
    /// P 帧的参考是最近的锚点帧, 即轮转后成为 `past` 的缓冲区.
    /// B 帧的参考是 `past` 与 `future`. 重建失败时角色保持不变.
    pub fn decode(
        &mut self,
        picture_type: PictureType,
        seq: &mut SequenceObject,
        payload: &[u8],
        reconstructor: &mut dyn PictureReconstructor,
    ) -> H4mResult<usize> {
        if !self.can_decode(picture_type) {
            return Err(H4mError::InvalidData(format!(
                "HVQM4: {picture_type:?} 帧缺少参考帧 (已有锚点 {})",
                self.anchors
            )));
        }

        let out_index = self.present;
        // present 与 past/future 永远是不同的索引, 取出后参考帧借用不会重叠
        let mut out = std::mem::take(&mut self.slots[out_index]);
        let result = match picture_type {
            PictureType::I => reconstructor.decode_i(seq, payload, &mut out),
            PictureType::P => {
                reconstructor.decode_p(seq, payload, &self.slots[self.future], &mut out)
            }
            PictureType::B => reconstructor.decode_b(
                seq,
                payload,
                &self.slots[self.past],
                &self.slots[self.future],
                &mut out,
            ),
            PictureType::None => Err(H4mError::InvalidData("HVQM4: 视频包缺少帧类型".into())),
        };
        self.slots[out_index] = out;
        result?;

        if picture_type.is_anchor() {
            self.rotate();
        }
        trace!(
            "HVQM4: {:?} 帧写入缓冲区 {}, 角色 past={} present={} future={}",
            picture_type, out_index, self.past, self.present, self.future
        );
        Ok(out_index)
    }

    /// future → past, present → future, 原 past 成为新的 present
    fn rotate(&mut self) {
        let freed = self.past;
        self.past = self.future;
        self.future = self.present;
        self.present = freed;
        self.anchors = (self.anchors + 1).min(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use h4m_core::ChromaSubsampling;

    /// 输出 Y[0] 写入帧号, 并记录每次调用看到的参考帧标记
    #[derive(Default)]
    struct Tagger {
        next_tag: u8,
        seen: Vec<(PictureType, Vec<u8>)>,
        fail_next: bool,
    }

    impl Tagger {
        fn finish(&mut self, pt: PictureType, refs: Vec<u8>, out: &mut PlanarBuffer) -> H4mResult<()> {
            if self.fail_next {
                self.fail_next = false;
                return Err(H4mError::InvalidData("损坏".into()));
            }
            self.next_tag += 1;
            out.as_bytes_mut()[0] = self.next_tag;
            self.seen.push((pt, refs));
            Ok(())
        }
    }

    impl PictureReconstructor for Tagger {
        fn decode_i(&mut self, _: &mut SequenceObject, _: &[u8], out: &mut PlanarBuffer) -> H4mResult<()> {
            self.finish(PictureType::I, vec![], out)
        }

        fn decode_p(
            &mut self,
            _: &mut SequenceObject,
            _: &[u8],
            past: &PlanarBuffer,
            out: &mut PlanarBuffer,
        ) -> H4mResult<()> {
            self.finish(PictureType::P, vec![past.as_bytes()[0]], out)
        }

        fn decode_b(
            &mut self,
            _: &mut SequenceObject,
            _: &[u8],
            past: &PlanarBuffer,
            future: &PlanarBuffer,
            out: &mut PlanarBuffer,
        ) -> H4mResult<()> {
            self.finish(PictureType::B, vec![past.as_bytes()[0], future.as_bytes()[0]], out)
        }
    }

    fn setup() -> (ReferenceSlots, SequenceObject, Tagger) {
        (
            ReferenceSlots::new(8, 8),
            SequenceObject::new(8, 8, ChromaSubsampling::YUV420).unwrap(),
            Tagger::default(),
        )
    }

    #[test]
    fn test_i_p_b_p_reference_order() {
        let (mut slots, mut seq, mut rec) = setup();
        for pt in [PictureType::I, PictureType::P, PictureType::B, PictureType::P] {
            slots.decode(pt, &mut seq, &[0], &mut rec).unwrap();
        }
        assert_eq!(
            rec.seen,
            vec![
                (PictureType::I, vec![]),
                (PictureType::P, vec![1]),
                (PictureType::B, vec![1, 2]),
                (PictureType::P, vec![2]),
            ]
        );
        // P4 成为 future, P2 成为 past
        assert_eq!(slots.buffer(SlotRole::Future).as_bytes()[0], 4);
        assert_eq!(slots.buffer(SlotRole::Past).as_bytes()[0], 2);
    }

    #[test]
    fn test_b_frame_output_is_never_a_reference() {
        let (mut slots, mut seq, mut rec) = setup();
        for pt in [
            PictureType::I,
            PictureType::P,
            PictureType::B,
            PictureType::B,
            PictureType::P,
            PictureType::B,
        ] {
            slots.decode(pt, &mut seq, &[0], &mut rec).unwrap();
        }
        // 第二个 B (tag 4) 依然参考 I1/P2, P5 参考 P2, 最后的 B 参考 P2/P5
        assert_eq!(rec.seen[3].1, vec![1, 2]);
        assert_eq!(rec.seen[4].1, vec![2]);
        assert_eq!(rec.seen[5].1, vec![2, 5]);
    }

    #[test]
    fn test_roles_are_distinct_slots() {
        let (mut slots, mut seq, mut rec) = setup();
        for pt in [PictureType::I, PictureType::P, PictureType::P, PictureType::B] {
            let out = slots.decode(pt, &mut seq, &[0], &mut rec).unwrap();
            let mut roles = [
                slots.slot_index(SlotRole::Past),
                slots.slot_index(SlotRole::Present),
                slots.slot_index(SlotRole::Future),
            ];
            roles.sort_unstable();
            assert_eq!(roles, [0, 1, 2]);
            if pt.is_anchor() {
                assert_eq!(out, slots.slot_index(SlotRole::Future));
            } else {
                assert_eq!(out, slots.slot_index(SlotRole::Present));
            }
        }
    }

    #[test]
    fn test_failed_decode_does_not_rotate() {
        let (mut slots, mut seq, mut rec) = setup();
        slots.decode(PictureType::I, &mut seq, &[0], &mut rec).unwrap();
        let before = (
            slots.slot_index(SlotRole::Past),
            slots.slot_index(SlotRole::Present),
            slots.slot_index(SlotRole::Future),
        );

        rec.fail_next = true;
        let err = slots
            .decode(PictureType::P, &mut seq, &[0], &mut rec)
            .unwrap_err();
        assert!(matches!(err, H4mError::InvalidData(_)));
        let after = (
            slots.slot_index(SlotRole::Past),
            slots.slot_index(SlotRole::Present),
            slots.slot_index(SlotRole::Future),
        );
        assert_eq!(before, after);
        assert_eq!(slots.anchor_count(), 1);

        // 下一个 P 仍然参考 I1
        slots.decode(PictureType::P, &mut seq, &[0], &mut rec).unwrap();
        assert_eq!(rec.seen.last().unwrap().1, vec![1]);
    }

    #[test]
    fn test_missing_references_rejected() {
        let (mut slots, mut seq, mut rec) = setup();
        assert!(!slots.can_decode(PictureType::P));
        assert!(slots.decode(PictureType::P, &mut seq, &[0], &mut rec).is_err());

        slots.decode(PictureType::I, &mut seq, &[0], &mut rec).unwrap();
        assert!(slots.can_decode(PictureType::P));
        assert!(!slots.can_decode(PictureType::B));

        slots.reset();
        assert_eq!(slots.anchor_count(), 0);
        assert!(slots.can_decode(PictureType::I));
        assert!(!slots.can_decode(PictureType::P));
    }
}
