use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use handpose_quiz::geometry::Point;
use handpose_quiz::hit_test::{HitTestEngine, TargetZone};
use handpose_quiz::quiz::{
    OptionLayout, QuestionPool, QuizConfig, QuizItem, QuizSession, RandRoundRng, Resolution,
};
use handpose_quiz::transform::Size;

fn pool_of(n: usize) -> QuestionPool {
    QuestionPool::new(
        (0..n)
            .map(|i| QuizItem::new(format!("p{i}"), format!("a{i}")))
            .collect(),
    )
    .expect("pool")
}

fn zones() -> Vec<TargetZone> {
    vec![
        TargetZone {
            label: "left".into(),
            center: Point::new(100.0, 100.0),
            radius: 40.0,
            correct: true,
        },
        TargetZone {
            label: "right".into(),
            center: Point::new(300.0, 100.0),
            radius: 40.0,
            correct: false,
        },
    ]
}

fn layout() -> OptionLayout {
    OptionLayout::row(Size::new(640.0, 480.0), 60.0)
}

proptest! {
    #[test]
    fn pt_round_has_three_distinct_options_one_correct(
        pool_size in 3_usize..12,
        seed in any::<u64>(),
        rounds in 1_usize..20,
    ) {
        let mut rng = RandRoundRng(StdRng::seed_from_u64(seed));
        let mut session = QuizSession::new(pool_of(pool_size), layout(), QuizConfig::default(), &mut rng, Duration::ZERO);

        for r in 0..rounds {
            let round = session.new_round(&mut rng, Duration::from_millis(r as u64)).clone();
            prop_assert_eq!(round.options.len(), 3);
            let unique: HashSet<&String> = round.options.iter().collect();
            prop_assert_eq!(unique.len(), 3);
            prop_assert_eq!(round.options.iter().filter(|o| **o == round.answer).count(), 1);
            prop_assert_eq!(round.zones.iter().filter(|z| z.correct).count(), 1);
        }
    }

    #[test]
    fn pt_score_moves_only_on_correct(
        increment in 1_u32..10,
        seed in any::<u64>(),
    ) {
        let config = QuizConfig { score_increment: increment, ..QuizConfig::default() };
        let mut rng = RandRoundRng(StdRng::seed_from_u64(seed));
        let mut session = QuizSession::new(pool_of(5), layout(), config, &mut rng, Duration::ZERO);

        let round = session.round().clone();
        let wrong = round.options.iter().find(|o| **o != round.answer).expect("distractor").clone();

        let before = session.score();
        let missed = session.resolve(&wrong, Duration::ZERO);
        prop_assert_eq!(missed, Resolution::Incorrect { label: wrong.clone() });
        prop_assert_eq!(session.score(), before);

        let resolved = session.resolve(&round.answer, Duration::from_millis(1));
        prop_assert_eq!(resolved, Resolution::Correct { score: before + increment, increment });
        prop_assert_eq!(session.score(), before + increment);
    }

    #[test]
    fn pt_continuous_dwell_fires_once(
        frames in 1_usize..200,
        step_ms in 1_u64..50,
        cooldown_ms in 0_u64..2000,
        jitter in 0.0_f64..30.0,
    ) {
        let zones = zones();
        let mut engine = HitTestEngine::new(Duration::from_millis(cooldown_ms));
        let mut fired = 0;
        for i in 0..frames {
            let p = Point::new(100.0 + if i % 2 == 0 { jitter } else { -jitter }, 100.0);
            if engine.update(Some(p), &zones, Duration::from_millis(i as u64 * step_ms)).is_some() {
                fired += 1;
            }
        }
        prop_assert_eq!(fired, 1);
    }

    #[test]
    fn pt_exit_and_reenter_rearms(
        cooldown_ms in 0_u64..1000,
        away_ms in 0_u64..3000,
    ) {
        let zones = zones();
        let inside = Point::new(100.0, 100.0);
        let outside = Point::new(200.0, 400.0);
        let mut engine = HitTestEngine::new(Duration::from_millis(cooldown_ms));

        prop_assert!(engine.update(Some(inside), &zones, Duration::ZERO).is_some());
        prop_assert!(engine.update(Some(inside), &zones, Duration::from_millis(10)).is_none());

        let left_at = 20 + away_ms;
        engine.update(Some(outside), &zones, Duration::from_millis(left_at));
        let again = engine.update(Some(inside), &zones, Duration::from_millis(left_at + 10));

        // 离开时冷却已过才会重新上膛
        prop_assert_eq!(again.is_some(), left_at >= cooldown_ms);
    }
}
