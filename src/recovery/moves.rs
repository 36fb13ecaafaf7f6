//! 恢复动作查表
//!
//! 料架、工位、偏移方向三元组决定检查位姿、恢复位姿与探压轴向。
//! 帧路径和探压距离是现场标定出来的常量，表里没有的组合视为
//! 没有已知的自动恢复手段。

use crate::interfaces::arm::Axis;

/// 被检查的料架
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rack {
    ChemRack,
    PxrdRack,
}

impl Rack {
    /// 帧树里使用的料架名
    pub fn frame_name(self) -> &'static str {
        match self {
            Rack::ChemRack => "ChemRack",
            Rack::PxrdRack => "PXRDRack",
        }
    }
}

/// 料架可能所处的工位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Station {
    ChemSpeedLoad,
    Base,
    Yumi,
    PxrdLoading,
}

impl Station {
    pub fn frame_name(self) -> &'static str {
        match self {
            Station::ChemSpeedLoad => "ChemSpeedLDStation_QR",
            Station::Base => "Base",
            Station::Yumi => "YumiStation_QR",
            Station::PxrdLoading => "PXRDLoadingStation_QR",
        }
    }

    /// 工位上标定好的检查位姿编号（机器人本体没有）
    fn check_pose_id(self) -> Option<u32> {
        match self {
            Station::ChemSpeedLoad => Some(10),
            Station::Base => None,
            Station::Yumi => Some(10),
            Station::PxrdLoading => Some(5),
        }
    }
}

/// 场景描述应答里报告的偏移方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Back,
    Forward,
}

impl Direction {
    /// 从应答文本里按字面子串识别方向词
    pub fn from_response(response: &str) -> Option<Self> {
        if response.contains("left") {
            Some(Direction::Left)
        } else if response.contains("right") {
            Some(Direction::Right)
        } else if response.contains("back") {
            Some(Direction::Back)
        } else if response.contains("forward") {
            Some(Direction::Forward)
        } else {
            None
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Back => "back",
            Direction::Forward => "forward",
        }
    }
}

/// 一次自动恢复动作：先走到恢复位姿，再沿轴做带符号的探压
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryMove {
    pub frame: String,
    pub axis: Axis,
    pub distance_mm: f64,
}

/// 检查位姿的帧路径
///
/// 机器人本体上的料架直接看 `/RobotRacks/...`，工位上的要经过
/// 相机帧与标记帧。
pub fn check_pose(station: Station, rack: Rack) -> String {
    match station.check_pose_id() {
        None => format!("/RobotRacks/Check_{}", rack.frame_name()),
        Some(id) => format!(
            "/{}/CheckPose_{}/CameraFrame/MarkerFrame/Check_{}",
            station.frame_name(),
            id,
            rack.frame_name()
        ),
    }
}

fn recovery_frame(station: Station, rack: Rack, direction: Direction) -> String {
    match station.check_pose_id() {
        None => format!("/RobotRacks/Recover/{}_{}", rack.frame_name(), direction.suffix()),
        Some(id) => format!(
            "/{}/CheckPose_{}/CameraFrame/MarkerFrame/Recover/{}_{}",
            station.frame_name(),
            id,
            rack.frame_name(),
            direction.suffix()
        ),
    }
}

/// 查恢复动作表，没有已知动作的组合返回 `None`
pub fn recovery_move(rack: Rack, station: Station, direction: Direction) -> Option<RecoveryMove> {
    use Direction::*;
    use Rack::*;
    use Station::*;

    let (axis, distance_mm) = match (rack, station, direction) {
        (ChemRack, ChemSpeedLoad, Left) => (Axis::X, -50.0),
        (ChemRack, Base, Left) => (Axis::Y, 50.0),
        (ChemRack, Yumi, Left) => (Axis::X, -50.0),
        (PxrdRack, Base, Left) => (Axis::Y, -50.0),
        (PxrdRack, Yumi, Left) => (Axis::X, -50.0),
        (PxrdRack, PxrdLoading, Left) => (Axis::X, -50.0),

        (ChemRack, ChemSpeedLoad, Right) => (Axis::X, 50.0),
        (ChemRack, Base, Right) => (Axis::Y, -50.0),
        (ChemRack, Yumi, Right) => (Axis::X, 50.0),
        (PxrdRack, Base, Right) => (Axis::Y, -50.0),
        (PxrdRack, Yumi, Right) => (Axis::X, 50.0),
        (PxrdRack, PxrdLoading, Right) => (Axis::X, 50.0),

        (ChemRack, ChemSpeedLoad, Back) => (Axis::Y, 50.0),
        (ChemRack, Base, Back) => (Axis::X, 50.0),
        (ChemRack, Yumi, Back) => (Axis::Y, 50.0),
        (PxrdRack, Base, Back) => (Axis::Y, 50.0),
        (PxrdRack, Yumi, Back) => (Axis::Y, 50.0),
        (PxrdRack, PxrdLoading, Back) => (Axis::Y, 50.0),

        (ChemRack, ChemSpeedLoad, Forward) => (Axis::Y, -50.0),
        (ChemRack, Base, Forward) => (Axis::X, -50.0),
        (ChemRack, Yumi, Forward) => (Axis::Y, -50.0),
        (PxrdRack, Base, Forward) => (Axis::Y, -50.0),
        (PxrdRack, Yumi, Forward) => (Axis::Y, -50.0),
        (PxrdRack, PxrdLoading, Forward) => (Axis::Y, -50.0),

        // ChemRack 不会出现在 PXRD 上样工位，PXRDRack 不会出现在
        // ChemSpeed 工位，没有为这些组合标定恢复位姿
        _ => return None,
    };

    Some(RecoveryMove {
        frame: recovery_frame(station, rack, direction),
        axis,
        distance_mm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pose_paths() {
        assert_eq!(
            check_pose(Station::Base, Rack::ChemRack),
            "/RobotRacks/Check_ChemRack"
        );
        assert_eq!(
            check_pose(Station::Yumi, Rack::PxrdRack),
            "/YumiStation_QR/CheckPose_10/CameraFrame/MarkerFrame/Check_PXRDRack"
        );
        assert_eq!(
            check_pose(Station::PxrdLoading, Rack::PxrdRack),
            "/PXRDLoadingStation_QR/CheckPose_5/CameraFrame/MarkerFrame/Check_PXRDRack"
        );
    }

    #[test]
    fn test_direction_from_response() {
        assert_eq!(
            Direction::from_response("False recoverable left"),
            Some(Direction::Left)
        );
        assert_eq!(
            Direction::from_response("False recoverable forward"),
            Some(Direction::Forward)
        );
        assert_eq!(Direction::from_response("False"), None);
    }

    #[test]
    fn test_recovery_move_lookup() {
        let m = recovery_move(Rack::ChemRack, Station::Base, Direction::Left).unwrap();
        assert_eq!(m.frame, "/RobotRacks/Recover/ChemRack_left");
        assert_eq!(m.axis, Axis::Y);
        assert_eq!(m.distance_mm, 50.0);

        let m = recovery_move(Rack::PxrdRack, Station::PxrdLoading, Direction::Right).unwrap();
        assert_eq!(
            m.frame,
            "/PXRDLoadingStation_QR/CheckPose_5/CameraFrame/MarkerFrame/Recover/PXRDRack_right"
        );
        assert_eq!(m.axis, Axis::X);
        assert_eq!(m.distance_mm, 50.0);
    }

    #[test]
    fn test_unknown_combination_has_no_move() {
        assert!(recovery_move(Rack::PxrdRack, Station::ChemSpeedLoad, Direction::Left).is_none());
        assert!(recovery_move(Rack::ChemRack, Station::PxrdLoading, Direction::Back).is_none());
    }
}
