use sfunet_domain::{Participant, ParticipantSid, Permissions, Track, TrackKind, TrackSid, TrackSource, UuidSidGenerator};
use sfunet_services::RoomManager;

/// `(source, kind)` identifies "the" camera/microphone/screen track for a
/// participant: publishing a second one replaces the first rather than
/// coexisting with it. Exercised at the service layer since producing a
/// second *real* producer for the same source requires a live mediasoup
/// negotiation the signaling handlers don't fake for tests.
#[test]
fn publishing_a_second_camera_track_replaces_the_first() {
    let room_manager = RoomManager::new(None, Box::new(UuidSidGenerator));
    let room = room_manager.create_room("replace".to_string(), None, None).into_result().unwrap();

    let sid = ParticipantSid::from("PA_alice");
    let participant = Participant::new(
        sid.clone(),
        "alice".to_string(),
        None,
        None,
        Permissions { may_publish: true, may_subscribe: true, may_publish_data: true },
        "conn-1".to_string(),
    );
    room_manager.add_participant(&room, participant).into_result().unwrap();

    let first = Track::new(TrackSid::from("TR_1"), TrackKind::Video, TrackSource::Camera);
    let stale = {
        let mut guard = room.write();
        guard.get_participant_mut(&sid).unwrap().publish_track(first)
    };
    assert!(stale.is_none());

    let second = Track::new(TrackSid::from("TR_2"), TrackKind::Video, TrackSource::Camera);
    let stale = {
        let mut guard = room.write();
        guard.get_participant_mut(&sid).unwrap().publish_track(second)
    };
    let stale = stale.expect("publishing a second camera track must evict the first");
    assert_eq!(stale.sid, TrackSid::from("TR_1"));

    let guard = room.read();
    let participant = guard.get_participant(&sid).unwrap();
    assert_eq!(participant.tracks.len(), 1);
    assert!(participant.tracks.contains_key(&TrackSid::from("TR_2")));
    assert!(!participant.tracks.contains_key(&TrackSid::from("TR_1")));
}

/// A microphone track is a distinct `(source, kind)` pair from a camera
/// track and must not be evicted by one.
#[test]
fn a_microphone_track_and_a_camera_track_coexist() {
    let room_manager = RoomManager::new(None, Box::new(UuidSidGenerator));
    let room = room_manager.create_room("coexist".to_string(), None, None).into_result().unwrap();

    let sid = ParticipantSid::from("PA_bob");
    let participant = Participant::new(
        sid.clone(),
        "bob".to_string(),
        None,
        None,
        Permissions { may_publish: true, may_subscribe: true, may_publish_data: true },
        "conn-1".to_string(),
    );
    room_manager.add_participant(&room, participant).into_result().unwrap();

    let camera = Track::new(TrackSid::from("TR_cam"), TrackKind::Video, TrackSource::Camera);
    let mic = Track::new(TrackSid::from("TR_mic"), TrackKind::Audio, TrackSource::Microphone);
    {
        let mut guard = room.write();
        let p = guard.get_participant_mut(&sid).unwrap();
        assert!(p.publish_track(camera).is_none());
        assert!(p.publish_track(mic).is_none());
    }

    let guard = room.read();
    assert_eq!(guard.get_participant(&sid).unwrap().tracks.len(), 2);
}

/// Screen-share and screen-share-audio are independent `(source, kind)`
/// pairs too, so replacing a screen-share video track must not disturb its
/// accompanying audio track.
#[test]
fn screen_share_video_replacement_leaves_its_audio_track_alone() {
    let room_manager = RoomManager::new(None, Box::new(UuidSidGenerator));
    let room = room_manager.create_room("screenshare".to_string(), None, None).into_result().unwrap();

    let sid = ParticipantSid::from("PA_carol");
    let participant = Participant::new(
        sid.clone(),
        "carol".to_string(),
        None,
        None,
        Permissions { may_publish: true, may_subscribe: true, may_publish_data: true },
        "conn-1".to_string(),
    );
    room_manager.add_participant(&room, participant).into_result().unwrap();

    {
        let mut guard = room.write();
        let p = guard.get_participant_mut(&sid).unwrap();
        p.publish_track(Track::new(TrackSid::from("TR_screen1"), TrackKind::Video, TrackSource::Screen));
        p.publish_track(Track::new(TrackSid::from("TR_screen_audio"), TrackKind::Audio, TrackSource::ScreenAudio));
        let stale = p.publish_track(Track::new(TrackSid::from("TR_screen2"), TrackKind::Video, TrackSource::Screen));
        assert_eq!(stale.unwrap().sid, TrackSid::from("TR_screen1"));
    }

    let guard = room.read();
    let p = guard.get_participant(&sid).unwrap();
    assert_eq!(p.tracks.len(), 2);
    assert!(p.tracks.contains_key(&TrackSid::from("TR_screen2")));
    assert!(p.tracks.contains_key(&TrackSid::from("TR_screen_audio")));
}
