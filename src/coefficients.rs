//! Coefficients of the Dormand-Prince 8(5,3) pair with its degree-7 dense output.
//!
//! Stages are indexed from zero here, so stage `s` of Hairer & Wanner's numbering is row
//! `s - 1`:
//!
//! * rows `0..12` are the twelve stages of a step,
//! * row `12` is the first-same-as-last stage `f(x + h, y_new)`; its weights are [`B`],
//! * rows `13..16` are the three extra stages required by the dense output.
//!
//! Reference: Hairer, E., Nørsett, S.P., & Wanner, G. (1993). "Solving Ordinary
//! Differential Equations I: Nonstiff Problems", 2nd ed., Springer. Section II.10.

/// Total number of stage rows, counting the dense-output stages.
pub const NUM_STAGES: usize = 16;

/// Number of stages evaluated for every step attempt.
pub const NUM_STEP_STAGES: usize = 12;

/// Row holding `f(x + h, y_new)`, which is reused as the first stage of the next step.
pub const FSAL_STAGE: usize = 12;

/// Order of the propagated solution.
pub const ORDER: u8 = 8;

/// Number of dense-output coefficient vectors.
pub const NUM_DENSE_COEFFICIENTS: usize = 8;

/// Nodes `c_i`: stage `i` is evaluated at `x + c[i] * h`.
pub const C: [f64; NUM_STAGES] = [
    0.0,
    0.526001519587677318785587544488e-1,
    0.789002279381515978178381316732e-1,
    0.118350341907227396726757197510e+0,
    0.281649658092772603273242802490e+0,
    0.333333333333333333333333333333e+0,
    0.25e+0,
    0.307692307692307692307692307692e+0,
    0.651282051282051282051282051282e+0,
    0.6e+0,
    0.857142857142857142857142857142e+0,
    1.0,
    1.0,
    0.1e+0,
    0.2e+0,
    0.777777777777777777777777777778e+0,
];

const A21: f64 = 5.26001519587677318785587544488e-2;

const A31: f64 = 1.97250569845378994544595329183e-2;
const A32: f64 = 5.91751709536136983633785987549e-2;

const A41: f64 = 2.95875854768068491816892993775e-2;
const A43: f64 = 8.87627564304205475450678981324e-2;

const A51: f64 = 2.41365134159266685502369798665e-1;
const A53: f64 = -8.84549479328286085344864962717e-1;
const A54: f64 = 9.24834003261792003115737966543e-1;

const A61: f64 = 3.7037037037037037037037037037e-2;
const A64: f64 = 1.70828608729473871279604482173e-1;
const A65: f64 = 1.25467687566822425016691814123e-1;

const A71: f64 = 3.7109375e-2;
const A74: f64 = 1.70252211019544039314978060272e-1;
const A75: f64 = 6.02165389804559606850219397283e-2;
const A76: f64 = -1.7578125e-2;

const A81: f64 = 3.70920001185047927108779319836e-2;
const A84: f64 = 1.70383925712239993810214054705e-1;
const A85: f64 = 1.07262030446373284651809199168e-1;
const A86: f64 = -1.53194377486244017527936158236e-2;
const A87: f64 = 8.27378916381402288758473766002e-3;

const A91: f64 = 6.24110958716075717114429577812e-1;
const A94: f64 = -3.36089262944694129406857109825e0;
const A95: f64 = -8.68219346841726006818189891453e-1;
const A96: f64 = 2.75920996994467083049415600797e1;
const A97: f64 = 2.01540675504778934086186788979e1;
const A98: f64 = -4.34898841810699588477366255144e1;

const A101: f64 = 4.77662536438264365890433908527e-1;
const A104: f64 = -2.48811461997166764192642586468e0;
const A105: f64 = -5.90290826836842996371446475743e-1;
const A106: f64 = 2.12300514481811942347288949897e1;
const A107: f64 = 1.52792336328824235832596922938e1;
const A108: f64 = -3.32882109689848629194453265587e1;
const A109: f64 = -2.03312017085086261358222928593e-2;

const A111: f64 = -9.3714243008598732571704021658e-1;
const A114: f64 = 5.18637242884406370830023853209e0;
const A115: f64 = 1.09143734899672957818500254654e0;
const A116: f64 = -8.14978701074692612513997267357e0;
const A117: f64 = -1.85200656599969598641566180701e1;
const A118: f64 = 2.27394870993505042818970056734e1;
const A119: f64 = 2.49360555267965238987089396762e0;
const A1110: f64 = -3.0467644718982195003823669022e0;

const A121: f64 = 2.27331014751653820792359768449e0;
const A124: f64 = -1.05344954667372501984066689879e1;
const A125: f64 = -2.00087205822486249909675718444e0;
const A126: f64 = -1.79589318631187989172765950534e1;
const A127: f64 = 2.79488845294199600508499808837e1;
const A128: f64 = -2.85899827713502369474065508674e0;
const A129: f64 = -8.87285693353062954433549289258e0;
const A1210: f64 = 1.23605671757943030647266201528e1;
const A1211: f64 = 6.43392746015763530355970484046e-1;

const B1: f64 = 5.42937341165687622380535766363e-2;
const B6: f64 = 4.45031289275240888144113950566e0;
const B7: f64 = 1.89151789931450038304281599044e0;
const B8: f64 = -5.8012039600105847814672114227e0;
const B9: f64 = 3.1116436695781989440891606237e-1;
const B10: f64 = -1.52160949662516078556178806805e-1;
const B11: f64 = 2.01365400804030348374776537501e-1;
const B12: f64 = 4.47106157277725905176885569043e-2;

const A141: f64 = 5.61675022830479523392909219681e-2;
const A147: f64 = 2.53500210216624811088794765333e-1;
const A148: f64 = -2.46239037470802489917441475441e-1;
const A149: f64 = -1.24191423263816360469010140626e-1;
const A1410: f64 = 1.5329179827876569731206322685e-1;
const A1411: f64 = 8.20105229563468988491666602057e-3;
const A1412: f64 = 7.56789766054569976138603589584e-3;
const A1413: f64 = -8.298e-3;

const A151: f64 = 3.18346481635021405060768473261e-2;
const A156: f64 = 2.83009096723667755288322961402e-2;
const A157: f64 = 5.35419883074385676223797384372e-2;
const A158: f64 = -5.49237485713909884646569340306e-2;
const A1511: f64 = -1.08347328697249322858509316994e-4;
const A1512: f64 = 3.82571090835658412954920192323e-4;
const A1513: f64 = -3.40465008687404560802977114492e-4;
const A1514: f64 = 1.41312443674632500278074618366e-1;

const A161: f64 = -4.28896301583791923408573538692e-1;
const A166: f64 = -4.69762141536116384314449447206e0;
const A167: f64 = 7.68342119606259904184240953878e0;
const A168: f64 = 4.06898981839711007970213554331e0;
const A169: f64 = 3.56727187455281109270669543021e-1;
const A1613: f64 = -1.39902416515901462129418009734e-3;
const A1614: f64 = 2.9475147891527723389556272149e0;
const A1615: f64 = -9.15095847217987001081870187138e0;

/// Runge-Kutta matrix, one row per stage. Row `i` holds the weights of stages `0..i`.
pub const A: [&[f64]; NUM_STAGES] = [
    &[],
    &[A21],
    &[A31, A32],
    &[A41, 0.0, A43],
    &[A51, 0.0, A53, A54],
    &[A61, 0.0, 0.0, A64, A65],
    &[A71, 0.0, 0.0, A74, A75, A76],
    &[A81, 0.0, 0.0, A84, A85, A86, A87],
    &[A91, 0.0, 0.0, A94, A95, A96, A97, A98],
    &[A101, 0.0, 0.0, A104, A105, A106, A107, A108, A109],
    &[A111, 0.0, 0.0, A114, A115, A116, A117, A118, A119, A1110],
    &[A121, 0.0, 0.0, A124, A125, A126, A127, A128, A129, A1210, A1211],
    &B,
    &[
        A141, 0.0, 0.0, 0.0, 0.0, 0.0, A147, A148, A149, A1410, A1411, A1412, A1413,
    ],
    &[
        A151, 0.0, 0.0, 0.0, 0.0, A156, A157, A158, 0.0, 0.0, A1511, A1512, A1513, A1514,
    ],
    &[
        A161, 0.0, 0.0, 0.0, 0.0, A166, A167, A168, A169, 0.0, 0.0, 0.0, A1613, A1614, A1615,
    ],
];

/// Weights of the 8th order solution over the twelve step stages.
pub const B: [f64; NUM_STEP_STAGES] = [
    B1, 0.0, 0.0, 0.0, 0.0, B6, B7, B8, B9, B10, B11, B12,
];

/// Weights of the 3rd order estimate, applied to stages `0`, `8` and `11`.
pub const BHH: [(usize, f64); 3] = [
    (0, 0.244094488188976377952755905512e+0),
    (8, 0.733846688281611857341361741547e+0),
    (11, 0.220588235294117647058823529412e-1),
];

/// Weights of the 5th order error estimator over the twelve step stages.
pub const ER: [f64; NUM_STEP_STAGES] = [
    0.1312004499419488073250102996e-1,
    0.0,
    0.0,
    0.0,
    0.0,
    -0.1225156446376204440720569753e+1,
    -0.4957589496572501915214079952e+0,
    0.1664377182454986536961530415e+1,
    -0.3503288487499736816886487290e+0,
    0.3341791187130174790297318841e+0,
    0.8192320648511571246570742613e-1,
    -0.2235530786388629525884427845e-1,
];

/// Weights of the dense-output coefficients 5 to 8 over all sixteen stage rows.
pub const D: [[f64; NUM_STAGES]; 4] = [
    [
        -0.84289382761090128651353491142e+1,
        0.0,
        0.0,
        0.0,
        0.0,
        0.56671495351937776962531783590e+0,
        -0.30689499459498916912797304727e+1,
        0.23846676565120698287728149680e+1,
        0.21170345824450282767155149946e+1,
        -0.87139158377797299206789907490e+0,
        0.22404374302607882758541771650e+1,
        0.63157877876946881815570249290e+0,
        -0.88990336451333310820698117400e-1,
        0.18148505520854727256656404962e+2,
        -0.91946323924783554000451984436e+1,
        -0.44360363875948939664310572000e+1,
    ],
    [
        0.10427508642579134603413151009e+2,
        0.0,
        0.0,
        0.0,
        0.0,
        0.24228349177525818288430175319e+3,
        0.16520045171727028198505394887e+3,
        -0.37454675472269020279518312152e+3,
        -0.22113666853125306036270938578e+2,
        0.77334326684722638389603898808e+1,
        -0.30674084731089398182061213626e+2,
        -0.93321305264302278729567221706e+1,
        0.15697238121770843886131091075e+2,
        -0.31139403219565177677282850411e+2,
        -0.93529243588444783865713862664e+1,
        0.35816841486394083752465898540e+2,
    ],
    [
        0.19985053242002433820987653617e+2,
        0.0,
        0.0,
        0.0,
        0.0,
        -0.38703730874935176555105901742e+3,
        -0.18917813819516756882830838328e+3,
        0.52780815920542364900561016686e+3,
        -0.11573902539959630126141871134e+2,
        0.68812326946963000169666922661e+1,
        -0.10006050966910838403183860980e+1,
        0.77771377980534432092869265740e+0,
        -0.27782057523535084065932004339e+1,
        -0.60196695231264120758267380846e+2,
        0.84320405506677161018159903784e+2,
        0.11992291136182789328035130030e+2,
    ],
    [
        -0.25693933462703749003312586129e+2,
        0.0,
        0.0,
        0.0,
        0.0,
        -0.15418974869023643374053993627e+3,
        -0.23152937917604549567536039109e+3,
        0.35763911791061412378285349910e+3,
        0.93405324183624310003907691704e+2,
        -0.37458323136451633156875139351e+2,
        0.10409964950896230045147246184e+3,
        0.29840293426660503123344363579e+2,
        -0.43533456590011143754432175058e+2,
        0.96324553959188282948394950600e+2,
        -0.39177261675615439165231486172e+2,
        -0.14972683625798562581422125276e+3,
    ],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_lower_triangular() {
        for (i, row) in A.iter().enumerate() {
            assert_eq!(row.len(), i, "row {i}");
        }
    }

    #[test]
    fn row_sums_match_nodes() {
        for (i, row) in A.iter().enumerate().skip(1) {
            let sum: f64 = row.iter().sum();
            approx::assert_abs_diff_eq!(sum, C[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn solution_weights_are_consistent() {
        approx::assert_abs_diff_eq!(B.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        approx::assert_abs_diff_eq!(ER.iter().sum::<f64>(), 0.0, epsilon = 1e-14);

        // The 3rd order weights form a consistent quadrature on their own.
        let bhh: f64 = BHH.iter().map(|&(_, b)| b).sum();
        approx::assert_abs_diff_eq!(bhh, 1.0, epsilon = 1e-14);
    }

    #[test]
    fn solution_integrates_polynomials_exactly() {
        // For y' = x^k the quadrature sum_i b_i c_i^k must equal 1 / (k + 1).
        for k in 0..=7 {
            let quadrature: f64 = B
                .iter()
                .zip(C.iter())
                .map(|(&b, &c)| b * c.powi(k))
                .sum();
            approx::assert_abs_diff_eq!(quadrature, 1.0 / (k + 1) as f64, epsilon = 1e-12);
        }
    }
}
